// tests/supervisor_scenarios.rs

use std::error::Error;
use std::sync::Arc;

use bootrun_test_utils::builders::mock_paths;
use bootrun_test_utils::fakes::{
    launched_artifact_states, CompilePlan, FakeCompiler, FakeGenerator, FakeLauncher,
    LaunchPlan, WorkerEvent,
};
use bootrun_test_utils::{captured, init_tracing, with_timeout, LogCapture};

use bootrun::errors::BootrunError;
use bootrun::fs::mock::MockFileSystem;
use bootrun::fs::FileSystem;
use bootrun::supervisor::{LaunchSupervisor, MAX_ATTEMPTS};
use bootrun::supervisor::diagnostics::FAULT_BANNER;
use bootrun::types::{CONFIG_ERROR, FAULT_FALLBACK, RESTART_REQUESTED, SUCCESS};
use bootrun::worker::WorkerMessage;

type TestResult = Result<(), Box<dyn Error>>;

const SCRIPT: &str = "build(targets);\n";

fn supervisor(
    fs: &MockFileSystem,
    generator: FakeGenerator,
    compiler: FakeCompiler,
    launcher: FakeLauncher,
) -> LaunchSupervisor<FakeGenerator, FakeCompiler, FakeLauncher> {
    LaunchSupervisor::new(Arc::new(fs.clone()), mock_paths(), generator, compiler, launcher)
}

#[tokio::test]
async fn missing_artifact_is_compiled_then_worker_status_is_returned() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    let compiler = FakeCompiler::new(fs.clone(), CompilePlan::Produce);
    let compiles = compiler.calls();
    let launcher = FakeLauncher::new(
        fs.clone(),
        vec![LaunchPlan::Run(vec![WorkerEvent::status(0)])],
    );
    let launches = launcher.launches();

    let mut sup = supervisor(&fs, FakeGenerator::script(SCRIPT), compiler, launcher);
    let mut err = Vec::new();
    let status = with_timeout(sup.run(&[], &mut err)).await?;

    assert_eq!(status, SUCCESS);
    assert_eq!(
        *compiles.lock().unwrap(),
        vec![(mock_paths().artifact, mock_paths().script)]
    );
    assert_eq!(launched_artifact_states(&launches), vec![true]);
    assert_eq!(
        fs.contents(&mock_paths().script),
        Some(SCRIPT.as_bytes().to_vec())
    );
    assert!(err.is_empty());

    Ok(())
}

#[tokio::test]
async fn existing_artifact_is_reused_without_compiling() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    fs.add_file(&mock_paths().artifact, "cached snapshot");

    let compiler = FakeCompiler::new(fs.clone(), CompilePlan::Produce);
    let compiles = compiler.calls();
    let launcher = FakeLauncher::new(
        fs.clone(),
        vec![LaunchPlan::Run(vec![WorkerEvent::status(0)])],
    );

    let mut sup = supervisor(&fs, FakeGenerator::script(SCRIPT), compiler, launcher);
    let status = with_timeout(sup.run(&[], &mut Vec::new())).await?;

    assert_eq!(status, SUCCESS);
    assert!(compiles.lock().unwrap().is_empty());
    assert_eq!(
        fs.contents(&mock_paths().artifact),
        Some(b"cached snapshot".to_vec())
    );

    Ok(())
}

#[tokio::test]
async fn worker_status_is_forwarded_verbatim_with_caller_args() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    let launcher = FakeLauncher::new(
        fs.clone(),
        vec![LaunchPlan::Run(vec![WorkerEvent::status(42)])],
    );
    let launches = launcher.launches();

    let mut sup = supervisor(
        &fs,
        FakeGenerator::script(SCRIPT),
        FakeCompiler::new(fs.clone(), CompilePlan::Produce),
        launcher,
    );
    let args = vec!["build".to_string(), "--verbose".to_string()];
    let status = with_timeout(sup.run(&args, &mut Vec::new())).await?;

    assert_eq!(status, 42);
    let launches = launches.lock().unwrap();
    assert_eq!(launches.len(), 1);
    assert_eq!(launches[0].args, args);
    assert_eq!(launches[0].artifact, mock_paths().artifact);

    Ok(())
}

#[tokio::test]
async fn restart_sentinel_from_worker_is_returned_unchanged() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    let launcher = FakeLauncher::new(
        fs.clone(),
        vec![LaunchPlan::Run(vec![WorkerEvent::status(RESTART_REQUESTED)])],
    );
    let launches = launcher.launches();

    let mut sup = supervisor(
        &fs,
        FakeGenerator::script(SCRIPT),
        FakeCompiler::new(fs.clone(), CompilePlan::Produce),
        launcher,
    );
    let status = with_timeout(sup.run(&[], &mut Vec::new())).await?;

    assert_eq!(status, RESTART_REQUESTED);
    assert_eq!(launches.lock().unwrap().len(), 1);

    Ok(())
}

#[tokio::test]
async fn unbuildable_script_returns_config_error_without_spawning() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    let compiler = FakeCompiler::new(fs.clone(), CompilePlan::Produce);
    let compiles = compiler.calls();
    let launcher = FakeLauncher::new(fs.clone(), vec![]);
    let launches = launcher.launches();
    let generator = FakeGenerator::cannot_build();
    let generations = generator.calls();

    let mut sup = supervisor(&fs, generator, compiler, launcher);
    let status = with_timeout(sup.run(&[], &mut Vec::new())).await?;

    assert_eq!(status, CONFIG_ERROR);
    assert_eq!(*generations.lock().unwrap(), 1);
    assert!(compiles.lock().unwrap().is_empty());
    assert!(launches.lock().unwrap().is_empty());
    assert!(!fs.exists(&mock_paths().script));

    Ok(())
}

#[tokio::test]
async fn failed_artifact_creation_returns_config_error_without_spawning() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    let compiler = FakeCompiler::new(
        fs.clone(),
        CompilePlan::LeaveNothing {
            stderr: "error: unknown import 'package:missing'".to_string(),
        },
    );
    let compiles = compiler.calls();
    let launcher = FakeLauncher::new(fs.clone(), vec![]);
    let launches = launcher.launches();
    let logs = LogCapture::new();
    let _guard = logs.install();

    let mut sup = supervisor(&fs, FakeGenerator::script(SCRIPT), compiler, launcher);
    let status = with_timeout(sup.run(&[], &mut Vec::new())).await?;

    assert_eq!(status, CONFIG_ERROR);
    assert_eq!(compiles.lock().unwrap().len(), 1);
    assert!(launches.lock().unwrap().is_empty());

    let logs = logs.contents();
    assert!(logs.contains("failed to precompile the build script"), "logs: {logs}");
    assert!(logs.contains("error: unknown import 'package:missing'"), "logs: {logs}");
    assert!(
        logs.contains(&mock_paths().artifact.display().to_string()),
        "logs: {logs}"
    );

    Ok(())
}

#[tokio::test]
async fn single_launch_failure_invalidates_artifact_and_retries_once() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    let generator = FakeGenerator::script(SCRIPT);
    let generations = generator.calls();
    let compiler = FakeCompiler::new(fs.clone(), CompilePlan::Produce);
    let compiles = compiler.calls();
    let launcher = FakeLauncher::new(
        fs.clone(),
        vec![
            LaunchPlan::Fail("snapshot was built by a different runtime version".to_string()),
            LaunchPlan::Run(vec![WorkerEvent::status(0)]),
        ],
    );
    let launches = launcher.launches();
    let logs = LogCapture::new();
    let _guard = logs.install();

    let mut sup = supervisor(&fs, generator, compiler, launcher);
    let status = with_timeout(sup.run(&[], &mut Vec::new())).await?;

    assert_eq!(status, SUCCESS);
    assert_eq!(launches.lock().unwrap().len(), 2);
    let logs = logs.contents();
    assert!(logs.contains("WARN"), "logs: {logs}");
    assert!(logs.contains("retrying"), "logs: {logs}");
    assert!(
        logs.contains("snapshot was built by a different runtime version"),
        "logs: {logs}"
    );
    assert_eq!(*generations.lock().unwrap(), 2);
    // The artifact was deleted after the first failure, so it had to be
    // compiled again for the second attempt.
    assert_eq!(compiles.lock().unwrap().len(), 2);
    assert_eq!(fs.removed(), vec![mock_paths().artifact]);
    assert_eq!(launched_artifact_states(&launches), vec![true, true]);

    Ok(())
}

#[tokio::test]
async fn repeated_launch_failure_stops_after_two_attempts() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    let launcher = FakeLauncher::new(
        fs.clone(),
        vec![
            LaunchPlan::Fail("exec format error".to_string()),
            LaunchPlan::Fail("exec format error".to_string()),
            LaunchPlan::Run(vec![WorkerEvent::status(0)]),
        ],
    );
    let launches = launcher.launches();
    let compiler = FakeCompiler::new(fs.clone(), CompilePlan::Produce);
    let compiles = compiler.calls();
    let logs = LogCapture::new();
    let _guard = logs.install();

    let mut sup = supervisor(&fs, FakeGenerator::script(SCRIPT), compiler, launcher);
    let status = with_timeout(sup.run(&[], &mut Vec::new())).await?;

    assert_eq!(status, CONFIG_ERROR);
    assert_eq!(launches.lock().unwrap().len(), MAX_ATTEMPTS as usize);
    let logs = logs.contents();
    assert!(logs.contains("ERROR"), "logs: {logs}");
    assert!(logs.contains("after retrying"), "logs: {logs}");
    assert!(
        logs.contains(&mock_paths().artifact.display().to_string()),
        "logs: {logs}"
    );
    assert_eq!(compiles.lock().unwrap().len(), 2);
    // Invalidated after the last attempt too, so the next invocation starts clean.
    assert!(!fs.exists(&mock_paths().artifact));
    assert_eq!(fs.removed().len(), 2);

    Ok(())
}

#[tokio::test]
async fn undeletable_artifact_after_launch_failure_is_a_config_error() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    fs.fail_removals("permission denied");
    let launcher = FakeLauncher::new(
        fs.clone(),
        vec![
            LaunchPlan::Fail("exec format error".to_string()),
            LaunchPlan::Run(vec![WorkerEvent::status(0)]),
        ],
    );
    let launches = launcher.launches();
    let compiler = FakeCompiler::new(fs.clone(), CompilePlan::Produce);
    let logs = LogCapture::new();
    let _guard = logs.install();

    let mut sup = supervisor(&fs, FakeGenerator::script(SCRIPT), compiler, launcher);
    let status = with_timeout(sup.run(&[], &mut Vec::new())).await?;

    assert_eq!(status, CONFIG_ERROR);
    // No second attempt against an artifact that could not be removed.
    assert_eq!(launches.lock().unwrap().len(), 1);
    assert!(fs.exists(&mock_paths().artifact));

    let logs = logs.contents();
    assert!(logs.contains("failed to delete the compiled build script"), "logs: {logs}");
    assert!(logs.contains("permission denied"), "logs: {logs}");
    assert!(
        logs.contains(&mock_paths().artifact.display().to_string()),
        "logs: {logs}"
    );

    Ok(())
}

#[tokio::test]
async fn fault_without_status_falls_back_to_one() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    let launcher = FakeLauncher::new(
        fs.clone(),
        vec![LaunchPlan::Run(vec![WorkerEvent::fault(
            "Bad state: no element",
            "#0 main (build.script:3)\n#1 run (build.script:9)",
        )])],
    );

    let mut sup = supervisor(
        &fs,
        FakeGenerator::script(SCRIPT),
        FakeCompiler::new(fs.clone(), CompilePlan::Produce),
        launcher,
    );
    let mut err = Vec::new();
    let status = with_timeout(sup.run(&[], &mut err)).await?;

    assert_eq!(status, FAULT_FALLBACK);
    let printed = captured(&err);
    assert!(printed.contains(FAULT_BANNER));
    assert!(printed.contains("Bad state: no element"));
    assert!(printed.contains("#0 main (build.script:3)"));

    Ok(())
}

#[tokio::test]
async fn fault_after_success_status_keeps_success() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    let launcher = FakeLauncher::new(
        fs.clone(),
        vec![LaunchPlan::Run(vec![
            WorkerEvent::status(0),
            WorkerEvent::fault("late error", ""),
        ])],
    );

    let mut sup = supervisor(
        &fs,
        FakeGenerator::script(SCRIPT),
        FakeCompiler::new(fs.clone(), CompilePlan::Produce),
        launcher,
    );
    let mut err = Vec::new();
    let status = with_timeout(sup.run(&[], &mut err)).await?;

    assert_eq!(status, SUCCESS);
    assert!(captured(&err).contains("late error"));

    Ok(())
}

#[tokio::test]
async fn non_integer_message_aborts_with_protocol_violation() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    let launcher = FakeLauncher::new(
        fs.clone(),
        vec![LaunchPlan::Run(vec![WorkerEvent::Message(WorkerMessage::Other(
            "done".to_string(),
        ))])],
    );

    let mut sup = supervisor(
        &fs,
        FakeGenerator::script(SCRIPT),
        FakeCompiler::new(fs.clone(), CompilePlan::Produce),
        launcher,
    );
    let result = with_timeout(sup.run(&[], &mut Vec::new())).await;

    match result {
        Err(BootrunError::ProtocolViolation(msg)) => assert!(msg.contains("done")),
        other => panic!("expected ProtocolViolation, got {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn supervisor_can_be_rerun_against_the_cached_artifact() -> TestResult {
    init_tracing();

    let fs = MockFileSystem::new();
    let compiler = FakeCompiler::new(fs.clone(), CompilePlan::Produce);
    let compiles = compiler.calls();
    let launcher = FakeLauncher::new(
        fs.clone(),
        vec![
            LaunchPlan::Run(vec![WorkerEvent::status(RESTART_REQUESTED)]),
            LaunchPlan::Run(vec![WorkerEvent::status(0)]),
        ],
    );

    let mut sup = supervisor(&fs, FakeGenerator::script(SCRIPT), compiler, launcher);
    assert_eq!(
        with_timeout(sup.run(&[], &mut Vec::new())).await?,
        RESTART_REQUESTED
    );
    assert_eq!(with_timeout(sup.run(&[], &mut Vec::new())).await?, SUCCESS);
    assert_eq!(compiles.lock().unwrap().len(), 1);
    assert!(sup.artifact_cache().is_present());

    Ok(())
}
