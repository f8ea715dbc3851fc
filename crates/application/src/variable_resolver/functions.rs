//! Template functions
//!
//! Functions are called from placeholders such as `{{hash.sha256('x')}}` or
//! `{{$uuid}}` and produce a fresh value on every evaluation.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use uuid::Uuid;

use super::parser::FunctionCall;

/// Longest string `random.string` and `random.hex` will produce.
pub const MAX_RANDOM_LENGTH: usize = 4096;

/// Inputs that are not function arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalContext {
    /// Current time, used by the `timestamp` family.
    pub now: DateTime<Utc>,
}

impl EvalContext {
    /// Creates a context for the given instant.
    #[must_use]
    pub const fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }
}

/// Why a function could not produce a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionError {
    /// A required argument is missing or empty.
    MissingArgument(&'static str),
    /// An argument could not be interpreted.
    InvalidArgument(String),
    /// The function failed on valid arguments.
    Failed(String),
}

impl fmt::Display for FunctionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingArgument(arg) => write!(f, "missing argument '{arg}'"),
            Self::InvalidArgument(msg) | Self::Failed(msg) => f.write_str(msg),
        }
    }
}

type Handler = fn(&[String], &EvalContext) -> Result<String, FunctionError>;

/// A catalog entry.
#[derive(Clone, Copy)]
pub struct FunctionInfo {
    /// Dotted function name.
    pub name: &'static str,
    /// Argument list as shown to users.
    pub signature: &'static str,
    /// Human-readable description
    pub description: &'static str,
    handler: Handler,
}

impl fmt::Debug for FunctionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionInfo")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

static CATALOG: &[FunctionInfo] = &[
    FunctionInfo {
        name: "hash.md5",
        signature: "(input)",
        description: "MD5 digest, lowercase hex",
        handler: |args, _| Ok(digest_hex::<md5::Md5>(required(args, 0, "input")?)),
    },
    FunctionInfo {
        name: "hash.sha1",
        signature: "(input)",
        description: "SHA-1 digest, lowercase hex",
        handler: |args, _| Ok(digest_hex::<Sha1>(required(args, 0, "input")?)),
    },
    FunctionInfo {
        name: "hash.sha256",
        signature: "(input)",
        description: "SHA-256 digest, lowercase hex",
        handler: |args, _| Ok(digest_hex::<Sha256>(required(args, 0, "input")?)),
    },
    FunctionInfo {
        name: "hash.sha512",
        signature: "(input)",
        description: "SHA-512 digest, lowercase hex",
        handler: |args, _| Ok(digest_hex::<Sha512>(required(args, 0, "input")?)),
    },
    FunctionInfo {
        name: "hmac.sha256",
        signature: "(message, secret)",
        description: "HMAC-SHA256 of message keyed by secret, lowercase hex",
        handler: |args, _| hmac_hex::<Hmac<Sha256>>(args),
    },
    FunctionInfo {
        name: "hmac.sha512",
        signature: "(message, secret)",
        description: "HMAC-SHA512 of message keyed by secret, lowercase hex",
        handler: |args, _| hmac_hex::<Hmac<Sha512>>(args),
    },
    FunctionInfo {
        name: "base64.encode",
        signature: "(input)",
        description: "Standard base64 with padding",
        handler: |args, _| Ok(STANDARD.encode(required(args, 0, "input")?)),
    },
    FunctionInfo {
        name: "base64.decode",
        signature: "(input)",
        description: "Decodes standard base64 into UTF-8 text",
        handler: |args, _| base64_decode(required(args, 0, "input")?),
    },
    FunctionInfo {
        name: "url.encode",
        signature: "(input)",
        description: "Percent-encodes a URL component",
        handler: |args, _| Ok(urlencoding::encode(required(args, 0, "input")?).into_owned()),
    },
    FunctionInfo {
        name: "url.decode",
        signature: "(input)",
        description: "Decodes a percent-encoded URL component",
        handler: |args, _| {
            urlencoding::decode(required(args, 0, "input")?)
                .map(std::borrow::Cow::into_owned)
                .map_err(|e| FunctionError::InvalidArgument(e.to_string()))
        },
    },
    FunctionInfo {
        name: "uuid",
        signature: "()",
        description: "Random UUID v4",
        handler: |_, _| Ok(Uuid::new_v4().to_string()),
    },
    FunctionInfo {
        name: "timestamp",
        signature: "()",
        description: "Unix timestamp in seconds",
        handler: |_, ctx| Ok(ctx.now.timestamp().to_string()),
    },
    FunctionInfo {
        name: "timestamp.ms",
        signature: "()",
        description: "Unix timestamp in milliseconds",
        handler: |_, ctx| Ok(ctx.now.timestamp_millis().to_string()),
    },
    FunctionInfo {
        name: "timestamp.iso",
        signature: "()",
        description: "ISO 8601 timestamp (UTC, milliseconds)",
        handler: |_, ctx| Ok(ctx.now.to_rfc3339_opts(SecondsFormat::Millis, true)),
    },
    FunctionInfo {
        name: "random.int",
        signature: "(min = 0, max = 100)",
        description: "Random integer in [min, max]",
        handler: |args, _| random_int(args),
    },
    FunctionInfo {
        name: "random.float",
        signature: "(min = 0, max = 1)",
        description: "Random float in [min, max)",
        handler: |args, _| random_float(args),
    },
    FunctionInfo {
        name: "random.string",
        signature: "(length = 16)",
        description: "Random alphanumeric string",
        handler: |args, _| {
            random_from_charset(
                b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789",
                args,
            )
        },
    },
    FunctionInfo {
        name: "random.hex",
        signature: "(length = 16)",
        description: "Random lowercase hex string",
        handler: |args, _| random_from_charset(b"0123456789abcdef", args),
    },
];

/// The template function catalog.
pub struct TemplateFunctions;

impl TemplateFunctions {
    /// Looks up a function by dotted name.
    #[must_use]
    pub fn lookup(name: &str) -> Option<&'static FunctionInfo> {
        CATALOG.iter().find(|f| f.name == name)
    }

    /// Returns every function in the catalog.
    #[must_use]
    pub fn available() -> &'static [FunctionInfo] {
        CATALOG
    }

    /// Evaluates a call. Returns `None` if the function is unknown.
    #[must_use]
    pub fn evaluate(call: &FunctionCall, ctx: &EvalContext) -> Option<Result<String, FunctionError>> {
        Self::lookup(&call.name).map(|info| (info.handler)(&call.args, ctx))
    }
}

/// Formats the inline marker that replaces a failed call.
#[must_use]
pub fn error_marker(name: &str, error: &FunctionError) -> String {
    format!("[error: {name}: {error}]")
}

fn required<'a>(args: &'a [String], index: usize, name: &'static str) -> Result<&'a str, FunctionError> {
    args.get(index)
        .map(String::as_str)
        .ok_or(FunctionError::MissingArgument(name))
}

/// An empty argument means "use the default".
fn optional(args: &[String], index: usize) -> Option<&str> {
    args.get(index).map(String::as_str).filter(|arg| !arg.is_empty())
}

fn parse_or<T: std::str::FromStr>(args: &[String], index: usize, name: &str, default: T) -> Result<T, FunctionError> {
    optional(args, index).map_or(Ok(default), |raw| {
        raw.parse()
            .map_err(|_| FunctionError::InvalidArgument(format!("'{name}' is not a number: {raw}")))
    })
}

fn digest_hex<D: Digest>(input: &str) -> String {
    hex::encode(D::digest(input.as_bytes()))
}

fn hmac_hex<M: Mac + hmac::digest::KeyInit>(args: &[String]) -> Result<String, FunctionError> {
    let message = required(args, 0, "message")?;
    let secret = required(args, 1, "secret")?;
    let mut mac = <M as hmac::digest::KeyInit>::new_from_slice(secret.as_bytes())
        .map_err(|e| FunctionError::Failed(e.to_string()))?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn base64_decode(input: &str) -> Result<String, FunctionError> {
    let bytes = STANDARD
        .decode(input)
        .map_err(|e| FunctionError::InvalidArgument(format!("invalid base64: {e}")))?;
    String::from_utf8(bytes).map_err(|_| FunctionError::Failed("decoded bytes are not UTF-8".into()))
}

fn random_int(args: &[String]) -> Result<String, FunctionError> {
    let min: i64 = parse_or(args, 0, "min", 0)?;
    let max: i64 = parse_or(args, 1, "max", 100)?;
    if min > max {
        return Err(FunctionError::InvalidArgument(format!("min {min} is greater than max {max}")));
    }
    Ok(rand::rng().random_range(min..=max).to_string())
}

fn random_float(args: &[String]) -> Result<String, FunctionError> {
    let min: f64 = parse_or(args, 0, "min", 0.0)?;
    let max: f64 = parse_or(args, 1, "max", 1.0)?;
    if !min.is_finite() || !max.is_finite() || min > max {
        return Err(FunctionError::InvalidArgument(format!("invalid range {min}..{max}")));
    }
    if min == max {
        return Ok(min.to_string());
    }
    if !(max - min).is_finite() {
        return Err(FunctionError::InvalidArgument(format!("range {min}..{max} is too wide")));
    }
    Ok(rand::rng().random_range(min..max).to_string())
}

fn random_from_charset(charset: &[u8], args: &[String]) -> Result<String, FunctionError> {
    let len: usize = parse_or(args, 0, "length", 16)?;
    if len > MAX_RANDOM_LENGTH {
        return Err(FunctionError::InvalidArgument(format!(
            "length {len} exceeds {MAX_RANDOM_LENGTH}"
        )));
    }
    let mut rng = rand::rng();
    Ok((0..len)
        .map(|_| charset[rng.random_range(0..charset.len())] as char)
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn ctx() -> EvalContext {
        EvalContext::at(Utc.with_ymd_and_hms(2024, 1, 26, 12, 0, 0).unwrap())
    }

    fn call(name: &str, args: &[&str]) -> Result<String, FunctionError> {
        let call = FunctionCall {
            name: name.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
        };
        TemplateFunctions::evaluate(&call, &ctx()).expect("function should exist")
    }

    #[test]
    fn test_hashes_of_known_inputs() {
        assert_eq!(call("hash.md5", &["x"]).unwrap(), "9dd4e461268c8034f5c8564e155c67a6");
        assert_eq!(
            call("hash.sha1", &["abc"]).unwrap(),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            call("hash.sha256", &["abc"]).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(call("hash.sha512", &["abc"]).unwrap().len(), 128);
    }

    #[test]
    fn test_hmac_sha256() {
        assert_eq!(
            call(
                "hmac.sha256",
                &["The quick brown fox jumps over the lazy dog", "key"]
            )
            .unwrap(),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn test_hmac_requires_secret() {
        assert_eq!(
            call("hmac.sha512", &["message"]),
            Err(FunctionError::MissingArgument("secret"))
        );
    }

    #[test]
    fn test_base64_both_ways() {
        assert_eq!(call("base64.encode", &["hi"]).unwrap(), "aGk=");
        assert_eq!(call("base64.decode", &["aGk="]).unwrap(), "hi");
        assert!(matches!(
            call("base64.decode", &["***"]),
            Err(FunctionError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_url_both_ways() {
        assert_eq!(call("url.encode", &["a b&c"]).unwrap(), "a%20b%26c");
        assert_eq!(call("url.decode", &["a%20b%26c"]).unwrap(), "a b&c");
    }

    #[test]
    fn test_timestamps_use_context_clock() {
        assert_eq!(call("timestamp", &[]).unwrap(), "1706270400");
        assert_eq!(call("timestamp.ms", &[]).unwrap(), "1706270400000");
        assert_eq!(call("timestamp.iso", &[]).unwrap(), "2024-01-26T12:00:00.000Z");
    }

    #[test]
    fn test_uuid_is_valid() {
        let value = call("uuid", &[]).unwrap();
        assert!(Uuid::parse_str(&value).is_ok());
    }

    #[test]
    fn test_random_int_respects_bounds() {
        for _ in 0..100 {
            let value: i64 = call("random.int", &["5", "7"]).unwrap().parse().unwrap();
            assert!((5..=7).contains(&value));
        }
        let default: i64 = call("random.int", &[]).unwrap().parse().unwrap();
        assert!((0..=100).contains(&default));
        assert!(call("random.int", &["9", "1"]).is_err());
        assert!(call("random.int", &["abc"]).is_err());
    }

    #[test]
    fn test_random_float_respects_bounds() {
        let value: f64 = call("random.float", &[]).unwrap().parse().unwrap();
        assert!((0.0..1.0).contains(&value));
        assert_eq!(call("random.float", &["2.5", "2.5"]).unwrap(), "2.5");
    }

    #[test]
    fn test_random_float_rejects_overflowing_range() {
        assert!(matches!(
            call("random.float", &["-1e308", "1e308"]),
            Err(FunctionError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_empty_string_is_a_supplied_argument() {
        assert_eq!(call("hash.md5", &[""]).unwrap(), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(call("base64.encode", &[""]).unwrap(), "");
        assert_eq!(call("url.encode", &[""]).unwrap(), "");
        assert_eq!(call("hash.md5", &[]), Err(FunctionError::MissingArgument("input")));
    }

    #[test]
    fn test_random_strings() {
        let s = call("random.string", &["32"]).unwrap();
        assert_eq!(s.len(), 32);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));

        let h = call("random.hex", &[]).unwrap();
        assert_eq!(h.len(), 16);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));

        assert!(call("random.hex", &["100000"]).is_err());
    }

    #[test]
    fn test_unknown_function() {
        let unknown = FunctionCall {
            name: "nope.nothing".into(),
            args: vec![],
        };
        assert!(TemplateFunctions::evaluate(&unknown, &ctx()).is_none());
    }

    #[test]
    fn test_error_marker_format() {
        let marker = error_marker("hash.md5", &FunctionError::MissingArgument("input"));
        assert_eq!(marker, "[error: hash.md5: missing argument 'input']");
    }

    #[test]
    fn test_catalog_names_are_unique() {
        let mut names: Vec<_> = TemplateFunctions::available().iter().map(|f| f.name).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }
}
