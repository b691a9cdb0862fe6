//! Service setting pipeline.
//!
//! Same shape as the route pipeline, but one rule fans out over every method
//! of a matched service: the method-name pattern is evaluated per method and
//! each [`MethodSetting`] is updated independently.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::schema::{PluginSpec, ServiceConfig};
use crate::routing::Filter;
use crate::setting::path::default_path;
use crate::setting::router::pattern_matches;

/// Endpoint generation for one service method.
#[derive(Clone, Default)]
pub struct MethodSetting {
    pub http_off: bool,
    pub http_path: String,
    /// Programmatic filters, run after `http_plugins`.
    pub http_filters: Vec<Filter>,
    pub http_plugins: Vec<PluginSpec>,
    pub wbsk_off: bool,
    pub wbsk_path: String,
    /// Programmatic filters, run after `wbsk_plugins`.
    pub wbsk_filters: Vec<Filter>,
    pub wbsk_plugins: Vec<PluginSpec>,
}

impl fmt::Debug for MethodSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodSetting")
            .field("http_off", &self.http_off)
            .field("http_path", &self.http_path)
            .field("http_filters", &self.http_filters.len())
            .field("http_plugins", &self.http_plugins)
            .field("wbsk_off", &self.wbsk_off)
            .field("wbsk_path", &self.wbsk_path)
            .field("wbsk_filters", &self.wbsk_filters.len())
            .field("wbsk_plugins", &self.wbsk_plugins)
            .finish()
    }
}

/// Endpoint generation for every method of one service.
#[derive(Debug, Clone)]
pub struct ServiceSetting {
    pub package_name: String,
    pub service_name: String,
    pub methods: BTreeMap<String, MethodSetting>,
}

pub type ServiceOption = Arc<dyn Fn(&mut ServiceSetting) + Send + Sync>;

pub fn service_option<F>(f: F) -> ServiceOption
where
    F: Fn(&mut ServiceSetting) + Send + Sync + 'static,
{
    Arc::new(f)
}

impl ServiceSetting {
    /// HTTP on and WebSocket off for every method, both at the default path.
    pub fn new<'a, I>(package_name: &str, service_name: &str, method_names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let methods = method_names
            .into_iter()
            .map(|name| {
                let path = default_path(package_name, service_name, name);
                let setting = MethodSetting {
                    http_off: false,
                    http_path: path.clone(),
                    wbsk_off: true,
                    wbsk_path: path,
                    ..MethodSetting::default()
                };
                (name.to_string(), setting)
            })
            .collect();

        Self {
            package_name: package_name.to_string(),
            service_name: service_name.to_string(),
            methods,
        }
    }

    pub fn apply<'a, I>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = &'a ServiceOption>,
    {
        for option in options {
            option(&mut self);
        }
        self
    }
}

impl ServiceConfig {
    pub fn matches_service(&self, setting: &ServiceSetting) -> bool {
        pattern_matches(&setting.package_name, &self.package)
            && pattern_matches(&setting.service_name, &self.service)
    }

    pub fn apply_to(&self, method: &mut MethodSetting) {
        if let Some(off) = self.http_off {
            method.http_off = off;
        }
        if !self.http_path.is_empty() {
            method.http_path = self.http_path.clone();
        }
        if !self.http_plugins.is_empty() {
            method.http_plugins = self.http_plugins.clone();
        }
        if let Some(off) = self.wbsk_off {
            method.wbsk_off = off;
        }
        if !self.wbsk_path.is_empty() {
            method.wbsk_path = self.wbsk_path.clone();
        }
        if !self.wbsk_plugins.is_empty() {
            method.wbsk_plugins = self.wbsk_plugins.clone();
        }
    }
}

/// One option per rule, in configuration order.
pub fn merge_service_config(configs: &[ServiceConfig]) -> Vec<ServiceOption> {
    configs
        .iter()
        .map(|config| {
            let config = config.clone();
            service_option(move |setting| {
                if !config.matches_service(setting) {
                    return;
                }
                for (name, method) in setting.methods.iter_mut() {
                    if pattern_matches(name, &config.method) {
                        config.apply_to(method);
                    }
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_service() -> ServiceSetting {
        ServiceSetting::new("demo", "UserService", ["GetUser", "ListUsers", "DeleteUser"])
    }

    #[test]
    fn test_defaults() {
        let setting = user_service();
        let get = &setting.methods["GetUser"];
        assert!(!get.http_off);
        assert!(get.wbsk_off);
        assert_eq!(get.http_path, "/demo/user/getuser");
        assert_eq!(get.wbsk_path, "/demo/user/getuser");
    }

    #[test]
    fn test_rule_fans_out_per_method() {
        let options = merge_service_config(&[ServiceConfig {
            service: "User*".into(),
            method: "*User".into(),
            http_off: Some(true),
            wbsk_off: Some(false),
            ..Default::default()
        }]);
        let setting = user_service().apply(&options);

        assert!(setting.methods["GetUser"].http_off);
        assert!(!setting.methods["GetUser"].wbsk_off);
        assert!(setting.methods["DeleteUser"].http_off);
        // "ListUsers" does not end with "User".
        assert!(!setting.methods["ListUsers"].http_off);
        assert!(setting.methods["ListUsers"].wbsk_off);
    }

    #[test]
    fn test_path_override_and_order() {
        let programmatic = vec![service_option(|s| {
            if let Some(m) = s.methods.get_mut("GetUser") {
                m.http_path = "/programmatic".into();
                m.http_plugins = vec![vec!["auth".into()]];
            }
        })];
        let declarative = merge_service_config(&[
            ServiceConfig {
                method: "GetUser".into(),
                http_path: "/v1/user".into(),
                ..Default::default()
            },
            ServiceConfig {
                method: "GetUser".into(),
                http_path: "/v2/user".into(),
                ..Default::default()
            },
        ]);
        let setting = user_service().apply(&programmatic).apply(&declarative);
        let get = &setting.methods["GetUser"];
        assert_eq!(get.http_path, "/v2/user");
        assert_eq!(get.http_plugins, vec![vec!["auth".to_string()]]);
    }

    #[test]
    fn test_unmatched_service_is_untouched() {
        let options = merge_service_config(&[ServiceConfig {
            package: "billing".into(),
            http_off: Some(true),
            ..Default::default()
        }]);
        let setting = user_service().apply(&options);
        assert!(setting.methods.values().all(|m| !m.http_off));
    }
}
