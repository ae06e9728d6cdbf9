use ferry_node::SlaveRegistry;
use regex::Regex;

use super::FromConfig;
use crate::config::FilterConfig;
use crate::error::{ConfigError, SelectionError};
use crate::filter::{Filter, FilterContext};
use crate::score::ScoreChart;

#[derive(Debug, Clone, PartialEq, Eq)]
enum AssignTarget {
    All,
    Slave(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A single `<slave>+<score>`, `<slave>-<score>` or `<slave>-remove` rule.
struct Assign {
    target: AssignTarget,
    /// `0` eliminates the target.
    score: i64,
}

impl Assign {
    fn parse(expr: &str) -> Option<Self> {
        let (pos, is_add) = match expr.find('+') {
            Some(pos) => (pos, true),
            None => (expr.find('-')?, false),
        };

        let (name, value) = (&expr[..pos], &expr[pos + 1..]);
        if name.is_empty() {
            return None;
        }

        let target = if name.eq_ignore_ascii_case("all") {
            AssignTarget::All
        } else {
            AssignTarget::Slave(name.to_string())
        };

        let score = if value.eq_ignore_ascii_case("remove") {
            0
        } else {
            let value = value.parse::<i64>().ok()?;
            if is_add {
                value
            } else {
                -value
            }
        };

        Some(Self { target, score })
    }
}

/// Translates a shell style glob into an anchored regex.
fn glob_to_regex(glob: &str) -> Result<Regex, regex::Error> {
    let mut pattern = String::with_capacity(glob.len() + 8);
    pattern.push('^');

    let mut in_class = false;
    for c in glob.chars() {
        match c {
            '*' if !in_class => pattern.push_str(".*"),
            '?' if !in_class => pattern.push('.'),
            '[' if !in_class => {
                in_class = true;
                pattern.push('[');
            },
            ']' if in_class => {
                in_class = false;
                pattern.push(']');
            },
            c if in_class => pattern.push(c),
            c => pattern.push_str(&regex::escape(&c.to_string())),
        }
    }

    pattern.push('$');
    Regex::new(&pattern)
}

#[derive(Debug, Clone)]
/// Adjusts the scores of specific slaves when the path matches a glob.
///
/// ```toml
/// [[upload]]
/// filter = "matchdir"
/// match = "/mp3/*"
/// assign = "slave1+100, slave2-remove"
/// ```
///
/// Assigns for slaves outside the chart are skipped, with `strict = true`
/// naming a slave the registry doesn't know is a configuration error.
pub struct MatchdirFilter {
    pattern: Regex,
    assigns: Vec<Assign>,
    strict: bool,
}

impl FromConfig for MatchdirFilter {
    fn from_config(config: &FilterConfig) -> Result<Self, ConfigError> {
        let invalid = |param: &str, reason: String| ConfigError::InvalidParam {
            filter: config.filter.clone(),
            param: param.to_string(),
            reason,
        };

        let glob = config.get_str("match")?;
        let pattern = glob_to_regex(&glob).map_err(|e| invalid("match", e.to_string()))?;

        let assigns = config
            .get_str("assign")?
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .map(|part| {
                Assign::parse(part)
                    .ok_or_else(|| invalid("assign", format!("{part:?} is not a valid assign expression")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if assigns.is_empty() {
            return Err(invalid("assign", "no assign expressions given".to_string()));
        }

        let strict = config.get_bool_or("strict", false)?;

        Ok(Self {
            pattern,
            assigns,
            strict,
        })
    }
}

impl Filter for MatchdirFilter {
    fn name(&self) -> &'static str {
        "matchdir"
    }

    fn process(
        &self,
        chart: &mut ScoreChart,
        ctx: &FilterContext<'_>,
    ) -> Result<(), SelectionError> {
        let Some(path) = ctx.path else {
            return Ok(());
        };

        if !self.pattern.is_match(path.as_str()) {
            return Ok(());
        }

        for assign in self.assigns.iter() {
            match (&assign.target, assign.score) {
                (AssignTarget::All, 0) => chart.retain(|_| false),
                (AssignTarget::All, score) => {
                    for slave in chart.scores_mut() {
                        slave.add_score(score);
                    }
                },
                (AssignTarget::Slave(name), 0) => {
                    chart.remove(name);
                },
                (AssignTarget::Slave(name), score) => {
                    chart.add_score(name, score);
                },
            }
        }

        Ok(())
    }

    fn validate(&self, registry: &dyn SlaveRegistry) -> Result<(), ConfigError> {
        if !self.strict {
            return Ok(());
        }

        let unknown = self.assigns.iter().find_map(|assign| match &assign.target {
            AssignTarget::Slave(name) if !registry.contains(name) => Some(name),
            _ => None,
        });
        match unknown {
            Some(slave) => Err(ConfigError::UnknownSlave {
                filter: self.name().to_string(),
                slave: slave.clone(),
            }),
            None => Ok(()),
        }
    }
}
