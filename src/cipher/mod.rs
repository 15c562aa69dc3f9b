use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::common::errors::StreamError;

/// One step of the signature transform, in driver-call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherOp {
  Reverse,
  /// Drop the first `n` characters, keeping the remainder.
  Slice(usize),
  /// Remove the first `n` characters in place.
  Splice(usize),
  /// Exchange index 0 with index `n % len`.
  Swap(usize),
}

/// The ordered transform extracted from one player-script build.
/// Immutable once extracted; cached per script URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherProgram {
  ops: Vec<CipherOp>,
}

impl CipherProgram {
  pub fn ops(&self) -> &[CipherOp] {
    &self.ops
  }

  /// Replays the transform over the signature characters.
  pub fn apply(&self, signature: &str) -> String {
    let mut chars: Vec<char> = signature.chars().collect();
    for op in &self.ops {
      match *op {
        CipherOp::Reverse => chars.reverse(),
        CipherOp::Slice(n) | CipherOp::Splice(n) => {
          chars.drain(..n.min(chars.len()));
        }
        CipherOp::Swap(n) => {
          if !chars.is_empty() {
            let idx = n % chars.len();
            chars.swap(0, idx);
          }
        }
      }
    }
    chars.into_iter().collect()
  }
}

/// Locates the minified helper object and the driver function in a player
/// script and walks the driver's call sequence into a `CipherProgram`.
///
/// Helpers are classified by body shape, never by name; names are minified
/// per build. An unrecognized layout fails the whole extraction; there is
/// no partial decipher.
pub fn extract_tokens(player_script: &str) -> Result<CipherProgram, StreamError> {
  let helpers = extract_helpers(player_script)?;
  let calls = extract_driver_calls(player_script)?;

  let mut ops = Vec::with_capacity(calls.len());
  for (helper_name, arg) in calls {
    let kind = helpers
      .get(helper_name)
      .copied()
      .ok_or(StreamError::CipherLayout)?;

    let op = match kind {
      HelperKind::Reverse => CipherOp::Reverse,
      HelperKind::Slice => CipherOp::Slice(arg.ok_or(StreamError::CipherLayout)?),
      HelperKind::Splice => CipherOp::Splice(arg.ok_or(StreamError::CipherLayout)?),
      HelperKind::Swap => CipherOp::Swap(arg.ok_or(StreamError::CipherLayout)?),
    };
    ops.push(op);
  }

  if ops.is_empty() {
    return Err(StreamError::CipherLayout);
  }

  debug!("extracted cipher program with {} ops", ops.len());
  Ok(CipherProgram { ops })
}

#[derive(Debug, Clone, Copy)]
enum HelperKind {
  Reverse,
  Slice,
  Splice,
  Swap,
}

/// Finds the helper object literal and classifies each member by body shape.
fn extract_helpers(
  script: &str,
) -> Result<std::collections::HashMap<&str, HelperKind>, StreamError> {
  let object_re = regex::Regex::new(
    r#"var\s+[A-Za-z0-9$_]+\s*=\s*\{\s*((?:[A-Za-z0-9$_]+\s*:\s*function\s*\(a(?:\s*,\s*b)?\)\s*\{[^}]*\}\s*,?\s*)+)\}\s*;"#,
  )
  .map_err(|_| StreamError::CipherLayout)?;

  let member_re = regex::Regex::new(
    r#"([A-Za-z0-9$_]+)\s*:\s*function\s*\(a(?:\s*,\s*b)?\)\s*\{([^}]*)\}"#,
  )
  .map_err(|_| StreamError::CipherLayout)?;

  let reverse_re = regex::Regex::new(r#"a\s*\.\s*reverse\s*\(\s*\)"#)
    .map_err(|_| StreamError::CipherLayout)?;
  let splice_re = regex::Regex::new(r#"a\s*\.\s*splice\s*\(\s*0\s*,\s*b\s*\)"#)
    .map_err(|_| StreamError::CipherLayout)?;
  let slice_re = regex::Regex::new(r#"return\s+a\s*\.\s*slice\s*\(\s*b\s*\)"#)
    .map_err(|_| StreamError::CipherLayout)?;
  let swap_re = regex::Regex::new(r#"a\[0\]\s*=\s*a\[b\s*%\s*a\.length\]"#)
    .map_err(|_| StreamError::CipherLayout)?;

  let body = object_re
    .captures(script)
    .and_then(|c| c.get(1))
    .ok_or(StreamError::CipherLayout)?;

  let mut helpers = std::collections::HashMap::new();
  for member in member_re.captures_iter(body.as_str()) {
    let name = member.get(1).map(|m| m.as_str()).unwrap_or_default();
    let code = member.get(2).map(|m| m.as_str()).unwrap_or_default();

    let kind = if reverse_re.is_match(code) {
      HelperKind::Reverse
    } else if splice_re.is_match(code) {
      HelperKind::Splice
    } else if swap_re.is_match(code) {
      HelperKind::Swap
    } else if slice_re.is_match(code) {
      HelperKind::Slice
    } else {
      return Err(StreamError::CipherLayout);
    };

    helpers.insert(name, kind);
  }

  if helpers.is_empty() {
    return Err(StreamError::CipherLayout);
  }
  Ok(helpers)
}

/// Walks the driver function body in source order, yielding each helper
/// call's name and optional literal integer argument.
fn extract_driver_calls(script: &str) -> Result<Vec<(&str, Option<usize>)>, StreamError> {
  let driver_re = regex::Regex::new(
    r#"function\s*\(a\)\s*\{a\s*=\s*a\.split\(\s*(?:""|'')\s*\)\s*;((?:[A-Za-z0-9$_]+\.[A-Za-z0-9$_]+\(a(?:\s*,\s*\d+)?\)\s*;\s*)+)return\s+a\.join\(\s*(?:""|'')\s*\)\s*\}"#,
  )
  .map_err(|_| StreamError::CipherLayout)?;

  let call_re = regex::Regex::new(r#"[A-Za-z0-9$_]+\.([A-Za-z0-9$_]+)\(a(?:\s*,\s*(\d+))?\)"#)
    .map_err(|_| StreamError::CipherLayout)?;

  let body = driver_re
    .captures(script)
    .and_then(|c| c.get(1))
    .ok_or(StreamError::CipherLayout)?;

  let calls: Vec<_> = call_re
    .captures_iter(body.as_str())
    .map(|c| {
      let name = c.get(1).map(|m| m.as_str()).unwrap_or_default();
      let arg = c.get(2).and_then(|m| m.as_str().parse().ok());
      (name, arg)
    })
    .collect();

  if calls.is_empty() {
    return Err(StreamError::CipherLayout);
  }
  Ok(calls)
}

/// Writes the deciphered signature into a format URL under the format's own
/// parameter name (`sp`, default `signature`), always requesting uncapped
/// delivery rate.
pub fn attach_signature(url: &str, sp: Option<&str>, signature: &str) -> String {
  let sep = if url.contains('?') { '&' } else { '?' };
  let param = sp.unwrap_or("signature");
  format!(
    "{}{}{}={}&ratebypass=yes",
    url,
    sep,
    param,
    urlencoding::encode(signature)
  )
}

/// Process-lifetime cache of extracted programs, keyed by player-script URL.
/// Shared read-only across sessions.
pub struct CipherCache {
  client: reqwest::Client,
  programs: DashMap<String, Arc<CipherProgram>>,
}

impl CipherCache {
  pub fn new(client: reqwest::Client) -> Self {
    Self {
      client,
      programs: DashMap::new(),
    }
  }

  /// Returns the cached program for a player script, fetching and
  /// extracting it on first sight of the URL.
  pub async fn program_for(&self, script_url: &str) -> Result<Arc<CipherProgram>, StreamError> {
    if let Some(program) = self.programs.get(script_url) {
      return Ok(program.clone());
    }

    let script = self
      .client
      .get(script_url)
      .send()
      .await?
      .text()
      .await?;

    let program = Arc::new(extract_tokens(&script)?);
    self
      .programs
      .insert(script_url.to_string(), program.clone());
    debug!("cached cipher program for {}", script_url);
    Ok(program)
  }

  /// Deciphers a format's signature and returns the playable URL.
  pub async fn resolve_url(
    &self,
    stream_url: &str,
    script_url: &str,
    signature: &str,
    sp: Option<&str>,
  ) -> Result<String, StreamError> {
    let program = self.program_for(script_url).await?;
    let deciphered = program.apply(signature);
    Ok(attach_signature(stream_url, sp, &deciphered))
  }
}
