//! Alias substitution and tokenization of submitted lines.

use std::collections::HashMap;

/// Alias name to raw expansion string
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    aliases: HashMap<String, String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define an alias, replacing any earlier definition of `name`
    pub fn set_alias(&mut self, name: impl Into<String>, expansion: impl Into<String>) {
        self.aliases.insert(name.into(), expansion.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// Delimiters between tokens: whitespace and the separators the
/// terminal may leave in a line (BEL included)
fn is_delimiter(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n' | '\x07') || c.is_whitespace()
}

/// Split a line into tokens; empty and whitespace-only lines give no tokens
pub fn tokenize(line: &str) -> Vec<String> {
    line.split(is_delimiter)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Turns a finished line into the token sequence handed to the dispatcher
#[derive(Debug, Clone, Default)]
pub struct CommandParser {
    aliases: AliasTable,
}

impl CommandParser {
    pub fn new(aliases: AliasTable) -> Self {
        Self { aliases }
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Tokenize `line`, substituting a leading alias.
    ///
    /// The leading token of the line itself is always substituted when it
    /// names an alias. A leading token produced by an expansion is
    /// substituted again only if its own expansion does not start with a
    /// name already resolved for this line, so `ls=ls --color` expands once
    /// and `a=b, b=a` stops after the first substitution.
    pub fn parse(&self, line: &str) -> Vec<String> {
        let mut resolved = Vec::new();
        self.parse_level(line, &mut resolved)
    }

    fn parse_level(&self, line: &str, resolved: &mut Vec<String>) -> Vec<String> {
        let mut tokens = tokenize(line);
        let Some(head) = tokens.first() else {
            return tokens;
        };
        let Some(expansion) = self.aliases.get(head) else {
            return tokens;
        };
        if !resolved.is_empty() && Self::leads_back(expansion, resolved) {
            return tokens;
        }

        resolved.push(head.clone());
        let rest = tokens.split_off(1);
        let mut expanded = self.parse_level(expansion, resolved);
        expanded.extend(rest);
        expanded
    }

    fn leads_back(expansion: &str, resolved: &[String]) -> bool {
        tokenize(expansion)
            .first()
            .is_some_and(|head| resolved.contains(head))
    }
}
