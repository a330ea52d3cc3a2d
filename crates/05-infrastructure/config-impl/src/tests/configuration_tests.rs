use crate::private::ConfigurationAdminPrivate;
use crate::{ConfigurationAdminImpl, ConfigurationImpl};
use config_abstractions::Configuration;
use infrastructure_common::{ConfigError, Properties};
use std::sync::{Arc, Weak};

/// 不关联配置管理核心的配置对象
fn detached(pid: &str) -> ConfigurationImpl {
    let admin: Weak<dyn ConfigurationAdminPrivate> = Weak::<ConfigurationAdminImpl>::new();
    ConfigurationImpl::new(admin, pid, Properties::new(), None)
}

/// 测试变更计数从 1 开始，每次更新加 1
#[test]
fn test_change_count_starts_at_one_and_increments() {
    let configuration = detached("counter");
    assert_eq!(configuration.get_change_count().unwrap(), 1);

    let future = configuration.update(Properties::new().with("a", 1)).unwrap();
    assert!(future.is_ready(), "未关联核心时通知应直接完成");
    assert_eq!(configuration.get_change_count().unwrap(), 2);

    configuration.update(Properties::new().with("a", 1)).unwrap();
    assert_eq!(configuration.get_change_count().unwrap(), 3, "无条件更新总是递增");
}

/// 测试 update_if_different 只在属性不同时更新
#[test]
fn test_update_if_different() {
    let configuration = detached("diff");
    let m1 = Properties::new().with("a", 1);
    let m2 = Properties::new().with("a", 2);

    let (updated, _) = configuration.update_if_different(m1.clone()).unwrap();
    assert!(updated);
    assert_eq!(configuration.get_change_count().unwrap(), 2);

    let (updated, future) = configuration.update_if_different(m1.clone()).unwrap();
    assert!(!updated, "相同属性不应更新");
    assert!(future.is_ready());
    assert_eq!(configuration.get_change_count().unwrap(), 2);

    let (updated, _) = configuration.update_if_different(m2.clone()).unwrap();
    assert!(updated);
    assert_eq!(configuration.get_change_count().unwrap(), 3);
    assert_eq!(configuration.get_properties().unwrap(), m2);
}

/// 测试属性比较忽略键名大小写
#[test]
fn test_update_if_different_ignores_key_case() {
    let configuration = detached("case");
    configuration
        .update(Properties::new().with("Port", 80))
        .unwrap();
    let (updated, _) = configuration
        .update_if_different(Properties::new().with("port", 80))
        .unwrap();
    assert!(!updated);
}

/// 测试 get_properties 返回副本
#[test]
fn test_get_properties_returns_copy() {
    let configuration = detached("copy");
    configuration.update(Properties::new().with("a", 1)).unwrap();

    let mut copy = configuration.get_properties().unwrap();
    copy.insert("b", 2);
    assert_eq!(configuration.get_properties().unwrap().len(), 1);
}

/// 测试工厂 PID 从 PID 推导
#[test]
fn test_factory_pid_derived_from_pid() {
    assert_eq!(detached("f~i1").get_factory_pid().unwrap(), "f");
    assert_eq!(detached("plain").get_factory_pid().unwrap(), "");
}

/// 测试移除后所有访问都失败，invalidate 仍然可用
#[test]
fn test_operations_fail_after_remove() {
    let configuration = detached("gone");
    configuration.remove().unwrap();
    assert!(configuration.is_removed());

    assert!(configuration.get_pid().unwrap_err().is_removed());
    assert!(configuration.get_factory_pid().unwrap_err().is_removed());
    assert!(configuration.get_properties().unwrap_err().is_removed());
    assert!(configuration.get_change_count().unwrap_err().is_removed());
    assert!(configuration.update(Properties::new()).unwrap_err().is_removed());
    assert!(configuration
        .update_if_different(Properties::new())
        .unwrap_err()
        .is_removed());
    assert!(configuration.remove().unwrap_err().is_removed(), "重复移除应当失败");
    assert!(configuration
        .update_without_notification_if_different(Properties::new())
        .unwrap_err()
        .is_removed());
    assert!(configuration
        .remove_without_notification_if_change_count_equals(2)
        .unwrap_err()
        .is_removed());

    configuration.invalidate();
    configuration.invalidate();
    assert_eq!(configuration.snapshot().unwrap_err().to_string(), ConfigError::removed("gone").to_string());
}

/// 测试不通知的更新返回当前变更计数
#[test]
fn test_update_without_notification() {
    let configuration = detached("silent");
    let props = Properties::new().with("k", "v");

    assert_eq!(
        configuration
            .update_without_notification_if_different(props.clone())
            .unwrap(),
        (true, 2)
    );
    assert_eq!(
        configuration
            .update_without_notification_if_different(props)
            .unwrap(),
        (false, 2)
    );
}

/// 测试按变更计数移除
#[test]
fn test_remove_if_change_count_equals() {
    let configuration = detached("occ");
    configuration.update(Properties::new().with("a", 1)).unwrap();

    assert!(!configuration
        .remove_without_notification_if_change_count_equals(1)
        .unwrap(), "变更计数过期时不应移除");
    assert!(!configuration.is_removed());

    assert!(configuration
        .remove_without_notification_if_change_count_equals(2)
        .unwrap());
    assert!(configuration.is_removed());
}

/// 测试配置标识唯一
#[test]
fn test_configuration_ids_are_unique() {
    let a = detached("same");
    let b = detached("same");
    assert_ne!(a.id(), b.id());
    assert!(a.id() < b.id());

    let shared: Arc<dyn Configuration> = Arc::new(a);
    assert_eq!(shared.get_pid().unwrap(), "same");
}
