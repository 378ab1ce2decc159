use std::sync::OnceLock;

use regex::Regex;

/// Matches `{{ env.NAME }}` and `{{ env.NAME | default("value") }}`
fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\{\{\s*([A-Za-z0-9_.]+)\s*(?:\|\s*default\("([^"]*)"\)\s*)?\}\}"#).expect("must be valid regex")
    })
}

/// Substitute environment placeholders in raw config text
///
/// Runs before TOML parsing so secrets never need to live in the file.
/// Comment lines are copied through untouched, which lets an example
/// config reference variables that are not set.
pub fn expand_env(input: &str) -> anyhow::Result<String> {
    let mut output = String::with_capacity(input.len());

    for line in input.split_inclusive('\n') {
        if line.trim_start().starts_with('#') {
            output.push_str(line);
            continue;
        }

        let mut cursor = 0;
        for captures in placeholder().captures_iter(line) {
            let (Some(whole), Some(key)) = (captures.get(0), captures.get(1)) else {
                continue;
            };

            output.push_str(&line[cursor..whole.start()]);
            output.push_str(&lookup(key.as_str(), captures.get(2).map(|m| m.as_str()))?);
            cursor = whole.end();
        }
        output.push_str(&line[cursor..]);
    }

    Ok(output)
}

fn lookup(key: &str, fallback: Option<&str>) -> anyhow::Result<String> {
    let Some(name) = key.strip_prefix("env.").filter(|name| !name.is_empty() && !name.contains('.')) else {
        anyhow::bail!("only variables scoped with 'env.' are supported: `{key}`");
    };

    match (std::env::var(name), fallback) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(fallback)) => Ok(fallback.to_owned()),
        (Err(_), None) => anyhow::bail!("environment variable not found: `{name}`"),
    }
}
