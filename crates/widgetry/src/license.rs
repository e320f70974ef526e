//! SPDX license expressions and the registry's license policy
//!
//! Only the subset of the SPDX expression grammar that shows up in manifests
//! is supported: license ids (including `LicenseRef-`/`DocumentRef-` forms),
//! the `+` suffix, the `-only`/`-or-later` spellings, `WITH` exceptions,
//! `AND`, `OR` and parentheses. `AND` binds tighter than `OR`.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Licenses accepted when no explicit policy is configured
pub const DEFAULT_ACCEPTED_LICENSES: [&str; 3] = ["Apache-2.0", "BSD-3-Clause", "MIT"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LicenseError {
    #[error("Invalid SPDX expression '{expression}': {reason}")]
    Parse { expression: String, reason: String },

    #[error("License '{expression}' is not satisfiable by accepted licenses [{accepted}]")]
    NotAccepted {
        expression: String,
        accepted: String,
    },

    #[error("License '{license}' is declared but not detected in the source tree (detected: [{detected}])")]
    NotDetected { license: String, detected: String },
}

/// One license term of an expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseTerm {
    /// Canonical id without `+`, `-only` or `-or-later`
    pub id: String,
    /// Whether later versions are also granted
    pub or_later: bool,
    pub exception: Option<String>,
}

impl LicenseTerm {
    fn new(raw: &str, exception: Option<String>) -> Self {
        let (id, or_later) = if let Some(id) = raw.strip_suffix('+') {
            (id, true)
        } else if let Some(id) = raw.strip_suffix("-or-later") {
            (id, true)
        } else if let Some(id) = raw.strip_suffix("-only") {
            (id, false)
        } else {
            (raw, false)
        };
        Self {
            id: id.to_string(),
            or_later,
            exception,
        }
    }

    /// Split `Apache-2.0` into (`Apache`, [2, 0]); ids without a trailing
    /// numeric version have no family
    fn family(&self) -> Option<(&str, Vec<u64>)> {
        let (family, version) = self.id.rsplit_once('-')?;
        let parts: Option<Vec<u64>> = version.split('.').map(|p| p.parse().ok()).collect();
        Some((family, parts?))
    }

    /// Whether granting `self` is acceptable given the allowed term
    fn satisfied_by(&self, allowed: &LicenseTerm) -> bool {
        if self.exception != allowed.exception {
            return false;
        }
        if self.id == allowed.id {
            return true;
        }
        match (self.family(), allowed.family()) {
            (Some((family, version)), Some((allowed_family, allowed_version)))
                if family == allowed_family =>
            {
                let ordering = compare_versions(&version, &allowed_version);
                (self.or_later && ordering != Ordering::Greater)
                    || (allowed.or_later && ordering != Ordering::Less)
            }
            _ => false,
        }
    }
}

impl fmt::Display for LicenseTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)?;
        if self.or_later {
            f.write_str("+")?;
        }
        if let Some(exception) = &self.exception {
            write!(f, " WITH {exception}")?;
        }
        Ok(())
    }
}

fn compare_versions(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Parsed SPDX license expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseExpression {
    Term(LicenseTerm),
    All(Vec<LicenseExpression>),
    Any(Vec<LicenseExpression>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    And,
    Or,
    With,
    Word(String),
}

fn tokenize(expression: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut word = String::new();

    let flush = |word: &mut String, tokens: &mut Vec<Token>| {
        if word.is_empty() {
            return;
        }
        let token = match word.to_ascii_uppercase().as_str() {
            "AND" => Token::And,
            "OR" => Token::Or,
            "WITH" => Token::With,
            _ => Token::Word(word.clone()),
        };
        tokens.push(token);
        word.clear();
    };

    for c in expression.chars() {
        match c {
            '(' | ')' => {
                flush(&mut word, &mut tokens);
                tokens.push(if c == '(' { Token::Open } else { Token::Close });
            }
            c if c.is_whitespace() => flush(&mut word, &mut tokens),
            c if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | ':' | '+') => word.push(c),
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    flush(&mut word, &mut tokens);
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn parse_or(&mut self) -> Result<LicenseExpression, String> {
        let mut branches = vec![self.parse_and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            branches.push(self.parse_and()?);
        }
        Ok(collapse(branches, LicenseExpression::Any))
    }

    fn parse_and(&mut self) -> Result<LicenseExpression, String> {
        let mut terms = vec![self.parse_atom()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            terms.push(self.parse_atom()?);
        }
        Ok(collapse(terms, LicenseExpression::All))
    }

    fn parse_atom(&mut self) -> Result<LicenseExpression, String> {
        match self.next() {
            Some(Token::Open) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err("missing closing parenthesis".into()),
                }
            }
            Some(Token::Word(word)) => {
                validate_license_id(&word)?;
                let exception = if self.peek() == Some(&Token::With) {
                    self.pos += 1;
                    match self.next() {
                        Some(Token::Word(exception)) if !exception.contains('+') => Some(exception),
                        _ => return Err("expected an exception id after WITH".into()),
                    }
                } else {
                    None
                };
                Ok(LicenseExpression::Term(LicenseTerm::new(&word, exception)))
            }
            Some(other) => Err(format!("unexpected token {other:?}")),
            None => Err("unexpected end of expression".into()),
        }
    }
}

fn validate_license_id(word: &str) -> Result<(), String> {
    let body = word.strip_suffix('+').unwrap_or(word);
    if body.is_empty() || body.contains('+') {
        return Err(format!("invalid license id '{word}'"));
    }
    Ok(())
}

fn collapse(
    mut items: Vec<LicenseExpression>,
    wrap: fn(Vec<LicenseExpression>) -> LicenseExpression,
) -> LicenseExpression {
    if items.len() == 1 {
        items.remove(0)
    } else {
        wrap(items)
    }
}

impl LicenseExpression {
    pub fn parse(expression: &str) -> Result<Self, LicenseError> {
        let error = |reason: String| LicenseError::Parse {
            expression: expression.to_string(),
            reason,
        };

        let tokens = tokenize(expression).map_err(error)?;
        if tokens.is_empty() {
            return Err(error("empty expression".into()));
        }

        let mut parser = Parser { tokens, pos: 0 };
        let parsed = parser.parse_or().map_err(error)?;
        if parser.pos != parser.tokens.len() {
            return Err(error(format!(
                "unexpected trailing token {:?}",
                parser.tokens[parser.pos]
            )));
        }
        Ok(parsed)
    }

    /// All terms in the expression, in order of appearance
    pub fn terms(&self) -> Vec<&LicenseTerm> {
        let mut out = Vec::new();
        self.collect_terms(&mut out);
        out
    }

    fn collect_terms<'a>(&'a self, out: &mut Vec<&'a LicenseTerm>) {
        match self {
            LicenseExpression::Term(term) => out.push(term),
            LicenseExpression::All(items) | LicenseExpression::Any(items) => {
                for item in items {
                    item.collect_terms(out);
                }
            }
        }
    }
}

/// The accepted-license allow list
#[derive(Debug, Clone)]
pub struct LicensePolicy {
    accepted: Vec<LicenseTerm>,
}

impl Default for LicensePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ACCEPTED_LICENSES)
            .expect("default accepted licenses are valid SPDX ids")
    }
}

impl LicensePolicy {
    /// Build a policy from SPDX ids (optionally `id WITH exception`)
    pub fn new<I, S>(accepted: I) -> Result<Self, LicenseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut terms = Vec::new();
        for license in accepted {
            match LicenseExpression::parse(license.as_ref())? {
                LicenseExpression::Term(term) => terms.push(term),
                _ => {
                    return Err(LicenseError::Parse {
                        expression: license.as_ref().to_string(),
                        reason: "accepted licenses must be single license ids".into(),
                    });
                }
            }
        }
        Ok(Self { accepted: terms })
    }

    fn accepts_term(&self, term: &LicenseTerm) -> bool {
        self.accepted.iter().any(|allowed| term.satisfied_by(allowed))
    }

    /// Whether some choice of `OR` branches uses only accepted licenses
    pub fn is_satisfied(&self, expression: &LicenseExpression) -> bool {
        match expression {
            LicenseExpression::Term(term) => self.accepts_term(term),
            LicenseExpression::All(items) => items.iter().all(|e| self.is_satisfied(e)),
            LicenseExpression::Any(items) => items.iter().any(|e| self.is_satisfied(e)),
        }
    }

    /// Accepted license ids asserted anywhere in the expression
    pub fn asserted(&self, expression: &LicenseExpression) -> BTreeSet<String> {
        expression
            .terms()
            .into_iter()
            .filter(|term| self.accepts_term(term))
            .map(|term| term.id.clone())
            .collect()
    }

    /// Validate a manifest's license field
    ///
    /// `detected` is the set of license ids found in the source tree, or
    /// `None` when no detector is configured.
    pub fn check(
        &self,
        spdx: &str,
        detected: Option<&BTreeSet<String>>,
    ) -> Result<(), LicenseError> {
        let expression = LicenseExpression::parse(spdx)?;
        if !self.is_satisfied(&expression) {
            return Err(LicenseError::NotAccepted {
                expression: spdx.to_string(),
                accepted: self.accepted_list(),
            });
        }

        if let Some(detected) = detected {
            let canonical: BTreeSet<String> = detected
                .iter()
                .map(|id| LicenseTerm::new(id, None).id)
                .collect();
            for license in self.asserted(&expression) {
                if !canonical.contains(&license) {
                    return Err(LicenseError::NotDetected {
                        license,
                        detected: detected.iter().cloned().collect::<Vec<_>>().join(", "),
                    });
                }
            }
        }

        Ok(())
    }

    fn accepted_list(&self) -> String {
        self.accepted
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
