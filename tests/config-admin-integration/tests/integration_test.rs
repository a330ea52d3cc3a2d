//! 配置管理服务端到端测试
use config_abstractions::{
    AsyncWorkService, Configuration, ConfigurationAdmin, ConfigurationException, ManagedService,
    ManagedServiceError, ManagedServiceFactory,
};
use config_impl::{CmActivator, CmSettings, TokioAsyncWorkService};
use infrastructure_common::pid::keys;
use infrastructure_common::Properties;
use parking_lot::Mutex;
use registry_abstractions::{ServiceRegistry, ServiceRegistryExt};
use registry_impl::InMemoryServiceRegistry;
use serde_json::{json, Map};
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// 测试用 ManagedService，属性中包含 `x` 时拒绝配置
#[derive(Default)]
struct TestService {
    calls: Mutex<Vec<Properties>>,
}

impl TestService {
    fn calls(&self) -> Vec<Properties> {
        self.calls.lock().clone()
    }
}

impl ManagedService for TestService {
    fn updated(&self, properties: &Properties) -> Result<(), ManagedServiceError> {
        self.calls.lock().push(properties.clone());
        if properties.contains_key("x") {
            return Err(ConfigurationException::with_property("bad value", "x").into());
        }
        Ok(())
    }
}

#[derive(Default)]
struct TestFactory {
    updated: Mutex<Vec<(String, Properties)>>,
    removed: Mutex<Vec<String>>,
}

impl TestFactory {
    fn updated_count(&self, pid: &str) -> usize {
        self.updated.lock().iter().filter(|(p, _)| p == pid).count()
    }

    fn removed_count(&self, pid: &str) -> usize {
        self.removed.lock().iter().filter(|p| *p == pid).count()
    }
}

impl ManagedServiceFactory for TestFactory {
    fn updated(&self, pid: &str, properties: &Properties) -> Result<(), ManagedServiceError> {
        self.updated.lock().push((pid.to_string(), properties.clone()));
        Ok(())
    }

    fn removed(&self, pid: &str) -> Result<(), ManagedServiceError> {
        self.removed.lock().push(pid.to_string());
        Ok(())
    }
}

/// 内存日志缓冲
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct Harness {
    registry: Arc<InMemoryServiceRegistry>,
    activator: CmActivator,
}

impl Harness {
    fn start() -> anyhow::Result<Self> {
        let registry = Arc::new(InMemoryServiceRegistry::new());
        let activator = CmActivator::new(CmSettings::default());
        activator.start(registry.clone() as Arc<dyn ServiceRegistry>)?;
        Ok(Self { registry, activator })
    }

    fn admin(&self) -> Arc<dyn ConfigurationAdmin> {
        let references = self.registry.references_of::<dyn ConfigurationAdmin>();
        self.registry
            .get_typed::<dyn ConfigurationAdmin>(&references[0])
            .expect("配置管理服务应已注册")
    }

    fn stop(self) {
        self.activator.stop();
    }
}

/// 轮询等待条件成立，超时返回 false
async fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// 等待一段时间，确认没有多余的通知
async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_managed_service_receives_update_exactly_once() -> anyhow::Result<()> {
    let harness = Harness::start()?;
    let service = Arc::new(TestService::default());
    harness.registry.register::<dyn ManagedService>(
        service.clone(),
        None,
        Properties::new().with(keys::SERVICE_PID, "x"),
    );
    assert!(wait_until(|| service.calls().len() == 1).await, "注册后应收到初始配置");

    let configuration = harness.admin().get_configuration("x")?;
    configuration.update(Properties::new().with("a", 1))?.await;

    assert!(wait_until(|| service.calls().len() == 2).await);
    settle().await;
    assert_eq!(
        service.calls(),
        vec![Properties::new(), Properties::new().with("a", 1)],
        "一次更新只应通知一次"
    );

    harness.stop();
    Ok(())
}

#[tokio::test]
async fn test_managed_service_factory_instances() -> anyhow::Result<()> {
    let harness = Harness::start()?;
    let factory = Arc::new(TestFactory::default());
    harness.registry.register::<dyn ManagedServiceFactory>(
        factory.clone(),
        None,
        Properties::new().with(keys::SERVICE_PID, "f"),
    );

    let admin = harness.admin();
    let i1 = admin.get_factory_configuration("f", "i1")?;
    admin.get_factory_configuration("f", "i2")?;

    assert!(wait_until(|| factory.updated_count("f~i1") == 1 && factory.updated_count("f~i2") == 1).await);

    i1.remove()?.await;
    assert!(wait_until(|| factory.removed_count("f~i1") == 1).await);
    settle().await;
    assert_eq!(factory.removed_count("f~i1"), 1);
    assert_eq!(factory.updated_count("f~i1"), 1, "移除后不应再收到更新");
    assert_eq!(factory.removed_count("f~i2"), 0);

    harness.stop();
    Ok(())
}

#[tokio::test]
async fn test_created_factory_configurations_are_distinct() -> anyhow::Result<()> {
    let harness = Harness::start()?;
    let admin = harness.admin();

    let a = admin.create_factory_configuration("f")?;
    let b = admin.create_factory_configuration("f")?;
    assert_ne!(a.get_pid()?, b.get_pid()?);
    for configuration in [&a, &b] {
        assert!(configuration.get_pid()?.starts_with("f~"));
        assert_eq!(configuration.get_factory_pid()?, "f");
        assert!(configuration.get_properties()?.is_empty());
    }

    harness.stop();
    Ok(())
}

#[tokio::test]
async fn test_rejected_configuration_is_logged_once() -> anyhow::Result<()> {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let harness = Harness::start()?;
    let service = Arc::new(TestService::default());
    harness.registry.register::<dyn ManagedService>(
        service.clone(),
        None,
        Properties::new().with(keys::SERVICE_PID, "strict"),
    );

    let configuration = harness.admin().get_configuration("strict")?;
    let future = configuration.update(Properties::new().with("x", 42))?;
    future.await;
    assert!(wait_until(|| service.calls().len() == 2).await);

    harness.stop();

    let rejected: Vec<String> = logs
        .lines()
        .into_iter()
        .filter(|line| line.contains("bad value") && line.contains('x'))
        .collect();
    assert_eq!(rejected.len(), 1, "拒绝配置应只记录一条日志: {:?}", rejected);
    assert!(rejected[0].contains("property=\"x\"") || rejected[0].contains("property=x"));
    Ok(())
}

#[tokio::test]
async fn test_bundle_configurations_follow_bundle_lifecycle() -> anyhow::Result<()> {
    let harness = Harness::start()?;
    let service = Arc::new(TestService::default());
    harness.registry.register::<dyn ManagedService>(
        service.clone(),
        None,
        Properties::new().with("service", json!({ "pid": "bundle.pid" })),
    );
    assert!(wait_until(|| service.calls().len() == 1).await);

    let mut headers = Map::new();
    headers.insert(
        keys::CM_KEY.to_string(),
        json!({
            "version": 1,
            "configurations": [
                { "pid": "bundle.pid", "properties": { "level": "debug" } },
                { "properties": { "orphan": true } }
            ]
        }),
    );
    let bundle = harness.registry.install_bundle("with-config", headers);
    harness.registry.start_bundle(bundle.id)?;

    assert!(wait_until(|| service.calls().len() == 2).await);
    assert_eq!(service.calls()[1], Properties::new().with("level", "debug"));

    harness.registry.stop_bundle(bundle.id)?;
    assert!(wait_until(|| service.calls().len() == 3).await);
    assert!(service.calls()[2].is_empty(), "模块停止后消费者收到空配置");

    harness.stop();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_deliver_latest_state() -> anyhow::Result<()> {
    let harness = Harness::start()?;
    let service = Arc::new(TestService::default());
    harness.registry.register::<dyn ManagedService>(
        service.clone(),
        None,
        Properties::new().with(keys::SERVICE_PID, "busy"),
    );
    let configuration = harness.admin().get_configuration("busy")?;

    let mut handles = Vec::new();
    for thread in 0..8 {
        let configuration = configuration.clone();
        handles.push(std::thread::spawn(move || {
            for i in 0..25 {
                let _ = configuration.update(Properties::new().with("n", thread * 100 + i));
            }
        }));
    }
    for handle in handles {
        handle.join().expect("更新线程不应 panic");
    }

    assert_eq!(configuration.get_change_count()?, 1 + 8 * 25);
    let latest = configuration.get_properties()?;
    assert!(wait_until(|| service.calls().last() == Some(&latest)).await, "最终应收到最新配置");
    assert!(service.calls().len() <= 1 + 8 * 25);

    harness.stop();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_notifications_run_on_host_executor() -> anyhow::Result<()> {
    let registry = Arc::new(InMemoryServiceRegistry::new());
    let executor: Arc<dyn AsyncWorkService> = Arc::new(TokioAsyncWorkService::current()?);
    registry.register::<dyn AsyncWorkService>(executor, None, Properties::new());

    let activator = CmActivator::default();
    activator.start(registry.clone() as Arc<dyn ServiceRegistry>)?;

    let service = Arc::new(TestService::default());
    registry.register::<dyn ManagedService>(
        service.clone(),
        None,
        Properties::new().with(keys::COMPONENT_NAME, "hosted"),
    );
    assert!(wait_until(|| service.calls().len() == 1).await);
    let admin = activator.admin().expect("配置管理核心应已启动");
    admin
        .get_configuration("hosted")?
        .update(Properties::new().with("ok", true))?
        .await;

    assert!(wait_until(|| service.calls().last() == Some(&Properties::new().with("ok", true))).await);

    tokio::task::spawn_blocking(move || activator.stop()).await?;
    Ok(())
}
