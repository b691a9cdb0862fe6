//! Default HTTP path for a service method.

/// Suffix dropped from service names when building paths.
pub const SERVICE_SUFFIX: &str = "Service";

/// `/package-segments/service-segments/method-segments`, where `.` becomes `/`,
/// ASCII upper case is folded to lower case, and a trailing `Service` is
/// dropped from the service name.
pub fn default_path(package_name: &str, service_name: &str, method_name: &str) -> String {
    let service_name = service_name
        .strip_suffix(SERVICE_SUFFIX)
        .unwrap_or(service_name);

    let mut path = String::with_capacity(package_name.len() + service_name.len() + method_name.len() + 3);
    for segment in [package_name, service_name, method_name] {
        path.push('/');
        push_segment(&mut path, segment);
    }
    path
}

fn push_segment(buf: &mut String, segment: &str) {
    buf.extend(segment.chars().map(|ch| match ch {
        '.' => '/',
        c => c.to_ascii_lowercase(),
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_path() {
        assert_eq!(default_path("demo.api", "UserService", "GetUser"), "/demo/api/user/getuser");
        assert_eq!(default_path("shop", "Cart", "Add"), "/shop/cart/add");
    }

    #[test]
    fn test_only_trailing_suffix_is_trimmed() {
        assert_eq!(default_path("p", "ServiceRegistry", "List"), "/p/serviceregistry/list");
        assert_eq!(default_path("p", "Service", "List"), "/p//list");
    }

    #[test]
    fn test_non_ascii_is_preserved() {
        assert_eq!(default_path("pkg", "Ärger", "Ö"), "/pkg/Ärger/Ö");
    }
}
