//! Version parsing and specifier matching for index versions.
//!
//! Supports the subset of PEP 440 that shows up in requirement files:
//! - Versions: `1.2.3`, `2!1.0`, `1.0a1`, `1.0rc2`, `1.0.post1`, `1.0.dev3`, `1.0+local`
//! - Operators: `==`, `!=` (both with `.*`), `>=`, `<=`, `>`, `<`, `~=`, `===`
//!
//! Pre-releases only match when a specifier mentions one.

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)^
        v?
        (?:(?P<epoch>\d+)!)?
        (?P<release>\d+(?:\.\d+)*)
        (?:[-_.]?(?P<pre_l>alpha|beta|preview|pre|a|b|c|rc)[-_.]?(?P<pre_n>\d+)?)?
        (?:-(?P<post_n1>\d+)|[-_.]?(?P<post_l>post|rev|r)[-_.]?(?P<post_n2>\d+)?)?
        (?:[-_.]?(?P<dev_l>dev)[-_.]?(?P<dev_n>\d+)?)?
        (?:\+(?P<local>[a-z0-9]+(?:[-_.][a-z0-9]+)*))?
        $",
    )
    .expect("version regex is valid")
});

static SPECIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(===|==|!=|~=|>=|<=|>|<)\s*(\S+)$").expect("specifier regex is valid")
});

/// Pre-release phase, ordered `a < b < rc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum PrePhase {
    Alpha,
    Beta,
    Rc,
}

/// A parsed version.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    epoch: u64,
    release: Vec<u64>,
    pre: Option<(PrePhase, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
    local: Option<String>,
}

fn number(caps: &regex::Captures<'_>, name: &str) -> Option<u64> {
    caps.name(name).map(|m| m.as_str().parse().unwrap_or(u64::MAX))
}

impl Version {
    /// Parse a version string. Returns `None` if it is not a valid version.
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        let caps = VERSION_RE.captures(&normalized)?;

        let release = caps["release"]
            .split('.')
            .map(|seg| seg.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;

        let pre = caps.name("pre_l").map(|l| {
            let phase = match l.as_str() {
                "a" | "alpha" => PrePhase::Alpha,
                "b" | "beta" => PrePhase::Beta,
                _ => PrePhase::Rc,
            };
            (phase, number(&caps, "pre_n").unwrap_or(0))
        });

        let post = number(&caps, "post_n1").or_else(|| {
            caps.name("post_l")
                .map(|_| number(&caps, "post_n2").unwrap_or(0))
        });

        let dev = caps
            .name("dev_l")
            .map(|_| number(&caps, "dev_n").unwrap_or(0));

        Some(Self {
            raw: s.trim().to_string(),
            epoch: number(&caps, "epoch").unwrap_or(0),
            release,
            pre,
            post,
            dev,
            local: caps.name("local").map(|m| m.as_str().to_string()),
        })
    }

    /// The string this version was parsed from.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether this is a pre- or dev-release.
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    /// Release segments without trailing zeros, so `1.0` == `1.0.0`.
    fn trimmed_release(&self) -> &[u64] {
        let len = self
            .release
            .iter()
            .rposition(|&n| n != 0)
            .map_or(0, |i| i + 1);
        &self.release[..len]
    }

    fn segment(&self, i: usize) -> u64 {
        self.release.get(i).copied().unwrap_or(0)
    }

    /// Whether `prefix` is a prefix of our release, zero-padded.
    fn release_starts_with(&self, prefix: &[u64]) -> bool {
        prefix.iter().enumerate().all(|(i, &n)| self.segment(i) == n)
    }

    fn same_release(&self, other: &Self) -> bool {
        self.epoch == other.epoch && self.trimmed_release() == other.trimmed_release()
    }

    /// Sort key of the public part (everything but the local label).
    fn public_key(&self) -> (u64, &[u64], (i8, u64), Option<u64>, (u8, u64)) {
        // a dev release of a final version sorts before its pre-releases
        let pre = match (self.pre, self.post, self.dev) {
            (None, None, Some(_)) => (-1, 0),
            (None, _, _) => (i8::MAX, 0),
            (Some((phase, n)), _, _) => (phase as i8, n),
        };
        let dev = self.dev.map_or((1, 0), |n| (0, n));
        (self.epoch, self.trimmed_release(), pre, self.post, dev)
    }

    fn cmp_public(&self, other: &Self) -> Ordering {
        self.public_key().cmp(&other.public_key())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_public(other)
            .then_with(|| self.local.cmp(&other.local))
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Comparison operator of a [`Specifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `>=`
    GreaterEqual,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `<`
    Less,
    /// `~=`
    Compatible,
    /// `===`
    Arbitrary,
}

impl Operator {
    fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::GreaterEqual => ">=",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::Less => "<",
            Self::Compatible => "~=",
            Self::Arbitrary => "===",
        }
    }
}

/// One clause of a version constraint, e.g. `>=1.0`.
#[derive(Debug, Clone)]
pub struct Specifier {
    op: Operator,
    raw: String,
    version: Option<Version>,
    wildcard: bool,
}

impl Specifier {
    /// Parse a single clause.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the clause is malformed.
    pub fn parse(s: &str) -> Result<Self, String> {
        let caps = SPECIFIER_RE
            .captures(s.trim())
            .ok_or_else(|| format!("invalid specifier '{s}'"))?;
        let op = match &caps[1] {
            "===" => Operator::Arbitrary,
            "==" => Operator::Equal,
            "!=" => Operator::NotEqual,
            "~=" => Operator::Compatible,
            ">=" => Operator::GreaterEqual,
            "<=" => Operator::LessEqual,
            ">" => Operator::Greater,
            _ => Operator::Less,
        };
        let raw = caps[2].to_string();

        if op == Operator::Arbitrary {
            return Ok(Self {
                op,
                raw,
                version: None,
                wildcard: false,
            });
        }

        let (text, wildcard) = match raw.strip_suffix(".*") {
            Some(prefix) if matches!(op, Operator::Equal | Operator::NotEqual) => (prefix, true),
            Some(_) => return Err(format!("wildcard not allowed with '{}'", op.as_str())),
            None => (raw.as_str(), false),
        };
        let version = Version::parse(text).ok_or_else(|| format!("invalid version '{text}'"))?;
        if op == Operator::Compatible && version.release.len() < 2 {
            return Err(format!("'~=' needs at least two release segments, got '{raw}'"));
        }

        Ok(Self {
            op,
            raw,
            version: Some(version),
            wildcard,
        })
    }

    /// The operator.
    pub fn operator(&self) -> Operator {
        self.op
    }

    /// The parsed version operand (`None` for `===`).
    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    /// Whether `candidate` satisfies this clause, ignoring pre-release policy.
    pub fn contains(&self, candidate: &Version) -> bool {
        let Some(spec) = &self.version else {
            return candidate.as_str().eq_ignore_ascii_case(&self.raw);
        };

        match self.op {
            Operator::Equal => self.equals(spec, candidate),
            Operator::NotEqual => !self.equals(spec, candidate),
            Operator::GreaterEqual => candidate.cmp_public(spec) != Ordering::Less,
            Operator::LessEqual => candidate.cmp_public(spec) != Ordering::Greater,
            Operator::Greater => {
                candidate.cmp_public(spec) == Ordering::Greater
                    // 1.0.post1 is not > 1.0 unless asked for
                    && !(spec.post.is_none()
                        && candidate.post.is_some()
                        && candidate.same_release(spec))
            }
            Operator::Less => {
                candidate.cmp_public(spec) == Ordering::Less
                    // 1.0rc1 is not < 1.0 unless asked for
                    && !(!spec.is_prerelease()
                        && candidate.is_prerelease()
                        && candidate.same_release(spec))
            }
            Operator::Compatible => {
                let prefix = &spec.release[..spec.release.len() - 1];
                candidate.cmp_public(spec) != Ordering::Less
                    && candidate.epoch == spec.epoch
                    && candidate.release_starts_with(prefix)
            }
            Operator::Arbitrary => candidate.as_str().eq_ignore_ascii_case(&self.raw),
        }
    }

    fn equals(&self, spec: &Version, candidate: &Version) -> bool {
        if self.wildcard {
            return candidate.epoch == spec.epoch && candidate.release_starts_with(&spec.release);
        }
        // a local label on the candidate is ignored unless the specifier has one
        match spec.local {
            None => candidate.cmp_public(spec) == Ordering::Equal,
            Some(_) => candidate == spec,
        }
    }
}

impl std::fmt::Display for Specifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.op.as_str(), self.raw)
    }
}

/// A comma-separated list of clauses that must all hold.
#[derive(Debug, Clone, Default)]
pub struct VersionSpecifiers(Vec<Specifier>);

impl VersionSpecifiers {
    /// Parse `>=1.0, <2` style input. Empty input matches every final release.
    ///
    /// # Errors
    ///
    /// Returns a description of the first malformed clause.
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::default());
        }
        s.split(',').map(Specifier::parse).collect::<Result<_, _>>().map(Self)
    }

    /// The individual clauses.
    pub fn specifiers(&self) -> &[Specifier] {
        &self.0
    }

    /// Whether `version` satisfies every clause.
    ///
    /// Pre-releases are only accepted when one of the clauses names a
    /// pre-release itself.
    pub fn contains(&self, version: &Version) -> bool {
        let allow_pre = self
            .0
            .iter()
            .any(|s| s.version().is_some_and(Version::is_prerelease));
        if version.is_prerelease() && !allow_pre {
            return false;
        }
        self.0.iter().all(|s| s.contains(version))
    }

    /// The version of an exact `==` pin, if that is all this constraint is.
    pub fn exact_pin(&self) -> Option<&Version> {
        match self.0.as_slice() {
            [only] if only.op == Operator::Equal && !only.wildcard => only.version(),
            _ => None,
        }
    }
}

impl std::fmt::Display for VersionSpecifiers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, spec) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{spec}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn matches(spec: &str, version: &str) -> bool {
        VersionSpecifiers::parse(spec).unwrap().contains(&v(version))
    }

    #[test]
    fn ordering_follows_release_phases() {
        let ordered = [
            "1.0.dev1", "1.0a1", "1.0a2", "1.0b1", "1.0rc1", "1.0", "1.0.post1", "1.0.1", "2!0.1",
        ];
        for pair in ordered.windows(2) {
            assert!(v(pair[0]) < v(pair[1]), "{} < {}", pair[0], pair[1]);
        }
        assert_eq!(v("1.0"), v("1.0.0"));
        assert_eq!(v("1.0RC1"), v("1.0rc1"));
        assert_eq!(v("1.0preview1"), v("1.0rc1"));
        assert!(!v("1.0+devbuild").is_prerelease());
    }

    #[test]
    fn rejects_garbage() {
        assert!(Version::parse("not-a-version").is_none());
        assert!(Version::parse("1.0/../x").is_none());
    }

    #[test]
    fn comparison_operators() {
        assert!(matches(">=1.0.0", "2.0.0"));
        assert!(matches(">=1.0.0,<2", "1.9"));
        assert!(!matches(">=1.0.0,<2", "2.0"));
        assert!(matches("==2.0.0", "2.0"));
        assert!(!matches("!=2.0.0", "2.0.0"));
        assert!(matches("==1.2.*", "1.2.7"));
        assert!(!matches("==1.2.*", "1.3.0"));
        assert!(matches("~=1.4.2", "1.4.9"));
        assert!(!matches("~=1.4.2", "1.5.0"));
        assert!(matches("", "0.0.1"));
    }

    #[test]
    fn prereleases_need_opt_in() {
        assert!(!matches(">=1.0", "2.0rc1"));
        assert!(matches(">=2.0rc1", "2.0rc1"));
        assert!(!matches("<2.0", "2.0b1"));
    }

    #[test]
    fn exact_pin() {
        let pinned = VersionSpecifiers::parse("==2.0.0").unwrap();
        assert_eq!(pinned.exact_pin(), Some(&v("2.0.0")));
        assert!(VersionSpecifiers::parse(">=1.0.0").unwrap().exact_pin().is_none());
        assert!(VersionSpecifiers::parse("==2.*").unwrap().exact_pin().is_none());
    }

    #[test]
    fn invalid_specifiers() {
        assert!(VersionSpecifiers::parse(">=").is_err());
        assert!(VersionSpecifiers::parse("~=1").is_err());
        assert!(VersionSpecifiers::parse(">=1.*").is_err());
    }
}
