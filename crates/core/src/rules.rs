use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// An extra injection pattern loaded from a `*.toml` rule file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PatternRule {
    pub name: String,
    pub pattern: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

pub fn load_rules_from_dir(dir: &Path) -> anyhow::Result<Vec<PatternRule>> {
    let mut rules = Vec::new();
    if !dir.exists() {
        return Ok(rules);
    }
    let mut paths: Vec<_> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("toml"))
        .collect();
    paths.sort();
    for path in paths {
        let content = fs::read_to_string(&path)?;
        let rule: PatternRule = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("invalid rule file {}: {}", path.display(), e))?;
        rules.push(rule);
    }
    Ok(rules)
}

/// Patterns of the enabled rules, in file-name order.
pub fn enabled_patterns(rules: &[PatternRule]) -> Vec<String> {
    rules
        .iter()
        .filter(|r| r.enabled)
        .map(|r| r.pattern.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_toml_rules_and_skips_other_files() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(
            temp.path().join("a_roleplay.toml"),
            "name = \"roleplay\"\npattern = \"pretend to be\"\n",
        )
        .unwrap();
        fs::write(
            temp.path().join("b_disabled.toml"),
            "name = \"off\"\npattern = \"whatever\"\nenabled = false\n",
        )
        .unwrap();
        fs::write(temp.path().join("notes.txt"), "not a rule").unwrap();

        let rules = load_rules_from_dir(temp.path()).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(enabled_patterns(&rules), vec!["pretend to be".to_string()]);
    }

    #[test]
    fn missing_dir_yields_no_rules() {
        let rules = load_rules_from_dir(Path::new("/no/such/rules/dir")).unwrap();
        assert!(rules.is_empty());
    }
}
