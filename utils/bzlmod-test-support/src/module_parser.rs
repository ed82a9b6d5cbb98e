use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use bzlmod::core::{Location, ModuleFile, ModuleFileParser, ModuleName, RepoName, Version};

/// A deliberately minimal module file reader for fixture content: one
/// directive per line, keyword arguments only, and only the `module()`
/// and `bazel_dep()` directives.
///
/// This is not a Starlark evaluator and never will be; it exists so
/// fixtures can be written as plain `MODULE.bazel` text. Production hosts
/// plug their real evaluator into [`ModuleFileParser`].
pub struct FixtureModuleFileParser;

impl ModuleFileParser for FixtureModuleFileParser {
    fn parse(&self, content: &[u8], file: &str) -> Result<ModuleFile> {
        let text = std::str::from_utf8(content).context("module file is not UTF-8")?;
        let mut builder = ModuleFile::builder();

        for (index, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let location = Location::new(file, (index + 1) as u32, 1);

            let (directive, args) = split_call(line)
                .with_context(|| format!("malformed directive at {location}: `{line}`"))?;
            let args = parse_kwargs(args)
                .with_context(|| format!("malformed arguments at {location}: `{line}`"))?;

            match directive {
                "module" => {
                    builder.module(
                        ModuleName::try_new(required(&args, "name", &location)?)?,
                        Version::parse(args.get("version").map(String::as_str).unwrap_or(""))?,
                        optional_u32(&args, "compatibility_level")?.unwrap_or(0),
                        vec![],
                        vec![],
                        location,
                    )?;
                }
                "bazel_dep" => {
                    let name = required(&args, "name", &location)?.to_owned();
                    let repo_name = args.get("repo_name").cloned().unwrap_or_else(|| name.clone());
                    builder.bazel_dep(
                        ModuleName::try_new(&name)?,
                        Version::parse(args.get("version").map(String::as_str).unwrap_or(""))?,
                        RepoName::try_new(&repo_name)?,
                        args.get("dev_dependency").map(String::as_str) == Some("True"),
                        location,
                    )?;
                }
                other => bail!("unsupported directive `{other}` at {location}"),
            }
        }

        Ok(builder.build())
    }
}

fn split_call(line: &str) -> Option<(&str, &str)> {
    let open = line.find('(')?;
    let close = line.rfind(')')?;
    if close < open {
        return None;
    }
    Some((line[..open].trim(), &line[open + 1..close]))
}

fn parse_kwargs(args: &str) -> Result<HashMap<String, String>> {
    let mut kwargs = HashMap::new();
    for part in args.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let Some((key, value)) = part.split_once('=') else {
            bail!("expected `key = value`, got `{part}`");
        };
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        kwargs.insert(key.trim().to_owned(), value.to_owned());
    }
    Ok(kwargs)
}

fn required<'a>(
    args: &'a HashMap<String, String>,
    key: &str,
    location: &Location,
) -> Result<&'a str> {
    args.get(key)
        .map(String::as_str)
        .with_context(|| format!("missing `{key}` argument at {location}"))
}

fn optional_u32(args: &HashMap<String, String>, key: &str) -> Result<Option<u32>> {
    args.get(key)
        .map(|value| {
            value
                .parse::<u32>()
                .with_context(|| format!("`{key}` is not an integer: `{value}`"))
        })
        .transpose()
}
