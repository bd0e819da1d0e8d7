/// Lower-case and strip a single trailing dot
fn normalize(domain: &str) -> String {
    let domain = domain.strip_suffix('.').unwrap_or(domain);
    domain.to_ascii_lowercase()
}

/// True when `domain` equals one of `rules` or is a strict subdomain of it
pub fn domain_matches<S: AsRef<str>>(domain: &str, rules: &[S]) -> bool {
    let domain = normalize(domain);
    rules
        .iter()
        .any(|rule| is_covered_by(&domain, &normalize(rule.as_ref())))
}

fn is_covered_by(domain: &str, rule: &str) -> bool {
    match domain.strip_suffix(rule) {
        Some("") => true,
        Some(prefix) => prefix.ends_with('.'),
        None => false,
    }
}

/// Blacklist with rules normalized once at startup
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    rules: Vec<String>,
}

impl Blacklist {
    pub fn new<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            rules: rules.into_iter().map(|rule| normalize(rule.as_ref())).collect(),
        }
    }

    pub fn is_blocked(&self, domain: &str) -> bool {
        domain_matches(domain, self.rules.as_slice())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subdomain_matches() {
        assert!(domain_matches("a.b.example.com", &["example.com"]));
        assert!(domain_matches("example.com", &["example.com"]));
    }

    #[test]
    fn test_suffix_without_dot_does_not_match() {
        assert!(!domain_matches("notexample.com", &["example.com"]));
        assert!(!domain_matches("com", &["example.com"]));
    }

    #[test]
    fn test_case_and_trailing_dot_insensitive() {
        assert!(domain_matches("Example.COM.", &["example.com"]));
        assert!(domain_matches("ads.example.com", &["EXAMPLE.com."]));
    }

    #[test]
    fn test_empty_rules() {
        let rules: [&str; 0] = [];
        assert!(!domain_matches("example.com", &rules));
        assert!(!Blacklist::default().is_blocked("example.com"));
    }

    #[test]
    fn test_blacklist_checks_every_rule() {
        let blacklist = Blacklist::new(["doubleclick.net", "Tracker.Test."]);
        assert_eq!(blacklist.len(), 2);
        assert!(blacklist.is_blocked("ads.tracker.test"));
        assert!(blacklist.is_blocked("stats.g.doubleclick.net."));
        assert!(!blacklist.is_blocked("example.org"));
        assert!(!blacklist.is_blocked("mytracker.test"));
    }

    #[test]
    fn test_blacklist_agrees_with_domain_matches() {
        let rules = ["example.com", "Tracker.Test."];
        let blacklist = Blacklist::new(rules);
        for domain in ["a.b.example.com", "notexample.com", "TRACKER.test.", "test", ""] {
            assert_eq!(
                blacklist.is_blocked(domain),
                domain_matches(domain, &rules),
                "{}",
                domain
            );
        }
    }
}
