//! robots.txt parsing and evaluation.
//!
//! Groups are matched by agent token and rules are evaluated in file order;
//! the first rule whose path prefixes the request path decides.

use url::Url;

/// Rule inside an agent group.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Rule {
    path: String,
    allow: bool,
}

impl Rule {
    fn new(path: &str, allow: bool) -> Self {
        // An empty Disallow grants everything.
        let allow = allow || path.is_empty();
        Self { path: encode_path(path), allow }
    }

    fn applies_to(&self, path: &str) -> bool {
        self.path == "*" || path.starts_with(&self.path)
    }
}

/// Percent-encode a rule path the way `Url` encodes request paths and
/// queries, so rules compare against `Url::path()` output.
fn encode_path(raw: &str) -> String {
    if !raw.starts_with('/') {
        return raw.to_string();
    }
    let Ok(mut url) = Url::parse("http://robots.invalid/") else {
        return raw.to_string();
    };

    let (path, query) = match raw.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (raw, None),
    };
    url.set_path(path);
    url.set_query(query);

    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// Rules for one or more user-agents.
#[derive(Debug, Clone, Default)]
struct AgentGroup {
    /// Agent tokens, lowercase
    agents: Vec<String>,
    rules: Vec<Rule>,
}

impl AgentGroup {
    fn is_wildcard(&self) -> bool {
        self.agents.iter().any(|a| a == "*")
    }

    /// Named agent tokens match when contained in the requested product token.
    fn applies_to(&self, agent: &str) -> bool {
        let product = agent.split('/').next().unwrap_or_default().to_lowercase();
        self.agents
            .iter()
            .any(|a| a == "*" || product.contains(a.as_str()))
    }

    fn allowance(&self, path: &str) -> bool {
        self.rules
            .iter()
            .find(|rule| rule.applies_to(path))
            .map(|rule| rule.allow)
            .unwrap_or(true)
    }
}

#[derive(Debug, Clone)]
enum Mode {
    AllowAll,
    DisallowAll,
    Rules,
}

/// Parsed crawling policy for one site.
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    mode: Mode,
    groups: Vec<AgentGroup>,
    default_group: Option<AgentGroup>,
}

#[derive(PartialEq)]
enum ParseState {
    Start,
    Agents,
    Rules,
}

impl RobotsPolicy {
    /// Policy used when the site publishes no robots resource.
    pub fn allow_all() -> Self {
        Self { mode: Mode::AllowAll, groups: Vec::new(), default_group: None }
    }

    /// Policy used when the robots resource is forbidden or unavailable.
    pub fn disallow_all() -> Self {
        Self { mode: Mode::DisallowAll, groups: Vec::new(), default_group: None }
    }

    /// Parse robots.txt content.
    pub fn parse(content: &str) -> Self {
        let mut policy = Self { mode: Mode::Rules, groups: Vec::new(), default_group: None };
        let mut group = AgentGroup::default();
        let mut state = ParseState::Start;

        for line in content.lines() {
            let line = match line.find('#') {
                Some(i) => &line[..i],
                None => line,
            }
            .trim();

            if line.is_empty() {
                // A blank line ends a group; agents without rules are dropped.
                if state == ParseState::Rules {
                    policy.add_group(std::mem::take(&mut group));
                } else if state == ParseState::Agents {
                    group = AgentGroup::default();
                }
                state = ParseState::Start;
                continue;
            }

            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match directive.trim().to_lowercase().as_str() {
                "user-agent" => {
                    if state == ParseState::Rules {
                        policy.add_group(std::mem::take(&mut group));
                    }
                    group.agents.push(value.to_lowercase());
                    state = ParseState::Agents;
                }
                "disallow" | "allow" if state != ParseState::Start => {
                    group.rules.push(Rule::new(value, directive.trim().eq_ignore_ascii_case("allow")));
                    state = ParseState::Rules;
                }
                _ => {}
            }
        }

        if state == ParseState::Rules {
            policy.add_group(group);
        }
        policy
    }

    fn add_group(&mut self, group: AgentGroup) {
        if group.is_wildcard() {
            // First wildcard group wins.
            if self.default_group.is_none() {
                self.default_group = Some(group);
            }
        } else {
            self.groups.push(group);
        }
    }

    /// Check whether `agent` may fetch `path` (path plus optional query).
    pub fn is_allowed(&self, agent: &str, path: &str) -> bool {
        match self.mode {
            Mode::AllowAll => return true,
            Mode::DisallowAll => return false,
            Mode::Rules => {}
        }

        let path = if path.is_empty() { "/" } else { path };

        if let Some(group) = self.groups.iter().find(|g| g.applies_to(agent)) {
            return group.allowance(path);
        }
        self.default_group
            .as_ref()
            .map(|g| g.allowance(path))
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let content = r#"
User-agent: *
Disallow: /private/
Disallow: /admin/ # staff only
Allow: /public/
        "#;

        let robots = RobotsPolicy::parse(content);

        assert!(robots.is_allowed("TestBot", "/public/page"));
        assert!(!robots.is_allowed("TestBot", "/private/page"));
        assert!(!robots.is_allowed("TestBot", "/admin/"));
        assert!(robots.is_allowed("TestBot", "/other/page"));
        assert!(robots.is_allowed("*", ""));
    }

    #[test]
    fn test_specific_user_agent() {
        let content = r#"
User-agent: *
Disallow: /

User-agent: goodbot
Disallow:
        "#;

        let robots = RobotsPolicy::parse(content);

        assert!(!robots.is_allowed("BadBot", "/page"));
        assert!(robots.is_allowed("GoodBot/2.1", "/page"));
        assert!(!robots.is_allowed("*", "/page"));
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let content = r#"
User-agent: *
Allow: /wiki/List_of_aquaria
Disallow: /wiki/
        "#;

        let robots = RobotsPolicy::parse(content);

        assert!(robots.is_allowed("*", "/wiki/List_of_aquaria_by_country"));
        assert!(!robots.is_allowed("*", "/wiki/Special:Random"));
    }

    #[test]
    fn test_shared_group_agents() {
        let content = "User-agent: alpha\nUser-agent: beta\nDisallow: /x\n";
        let robots = RobotsPolicy::parse(content);

        assert!(!robots.is_allowed("alpha", "/x/1"));
        assert!(!robots.is_allowed("Beta", "/x/1"));
        assert!(robots.is_allowed("gamma", "/x/1"));
    }

    #[test]
    fn test_query_string_is_matched() {
        let content = "User-agent: *\nDisallow: /search?\n";
        let robots = RobotsPolicy::parse(content);

        assert!(!robots.is_allowed("*", "/search?q=sharks"));
        assert!(robots.is_allowed("*", "/search"));
    }

    #[test]
    fn test_non_ascii_rule_matches_encoded_request_path() {
        let robots = RobotsPolicy::parse("User-agent: *\nDisallow: /wiki/Café\nDisallow: /wiki/Ä?x=ü\n");

        let cafe = Url::parse("https://example.org/wiki/Café").unwrap();
        assert_eq!(cafe.path(), "/wiki/Caf%C3%A9");
        assert!(!robots.is_allowed("*", cafe.path()));
        assert!(!robots.is_allowed("*", "/wiki/Caf%C3%A9_Aquarium"));
        assert!(robots.is_allowed("*", "/wiki/Cafe"));

        let query = Url::parse("https://example.org/wiki/Ä?x=ü").unwrap();
        let path = format!("{}?{}", query.path(), query.query().unwrap());
        assert!(!robots.is_allowed("*", &path));
    }

    #[test]
    fn test_already_encoded_rule_is_left_alone() {
        let robots = RobotsPolicy::parse("User-agent: *\nDisallow: /wiki/Caf%C3%A9\n");
        assert!(!robots.is_allowed("*", "/wiki/Caf%C3%A9"));
    }

    #[test]
    fn test_rules_before_any_agent_are_ignored() {
        let robots = RobotsPolicy::parse("Disallow: /\n");
        assert!(robots.is_allowed("Bot", "/anything"));
    }

    #[test]
    fn test_empty_robots() {
        let robots = RobotsPolicy::parse("");
        assert!(robots.is_allowed("AnyBot", "/any/path"));
    }

    #[test]
    fn test_fixed_modes() {
        assert!(RobotsPolicy::allow_all().is_allowed("Bot", "/"));
        assert!(!RobotsPolicy::disallow_all().is_allowed("Bot", "/"));
    }
}
