//! PID 约定与清单键名常量

/// 工厂实例 PID 分隔符，格式为 `factoryPid~instanceName`
pub const FACTORY_PID_SEPARATOR: char = '~';

/// 清单与服务属性中使用的键名
pub mod keys {
    /// 模块清单中配置数据所在的键
    pub const CM_KEY: &str = "cm";
    /// 清单版本
    pub const CM_VERSION: &str = "version";
    /// 配置列表
    pub const CM_CONFIGURATIONS: &str = "configurations";
    /// 单个配置的 PID
    pub const CM_PID: &str = "pid";
    /// 单个配置的属性
    pub const CM_PROPERTIES: &str = "properties";

    /// 服务属性 `service`，其子属性 `pid` 为 PID
    pub const SERVICE_KEY: &str = "service";
    /// `service` 下存放 PID 的子属性
    pub const SERVICE_SUBKEY: &str = "pid";
    /// 服务属性 `component`，其子属性 `name` 为 PID
    pub const COMPONENT_KEY: &str = "component";
    /// `component` 下存放 PID 的子属性
    pub const COMPONENT_SUBKEY: &str = "name";

    /// 平铺形式的 `service.pid`
    pub const SERVICE_PID: &str = "service.pid";
    /// 平铺形式的 `component.name`
    pub const COMPONENT_NAME: &str = "component.name";

    /// 注册表分配的服务 ID
    pub const SERVICE_ID: &str = "service.id";
    /// 服务排名，数值越大越优先
    pub const SERVICE_RANKING: &str = "service.ranking";
}

/// 从 PID 推导工厂 PID
///
/// 取第一个 `~` 之前的部分；不含 `~` 时返回空串。
pub fn factory_pid_of(pid: &str) -> &str {
    pid.split_once(FACTORY_PID_SEPARATOR)
        .map_or("", |(factory_pid, _)| factory_pid)
}

/// 拼接工厂实例 PID
pub fn factory_instance_pid(factory_pid: &str, instance_name: &str) -> String {
    format!("{factory_pid}{FACTORY_PID_SEPARATOR}{instance_name}")
}
