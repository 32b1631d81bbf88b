pub mod config;
pub mod types;

use std::io::{self, Write};

use config::OutputConfig;
use types::Envelope;

/// Write one envelope as a JSON line on stdout.
pub fn emit(env: &Envelope) -> io::Result<()> {
    let cfg = OutputConfig::from_env();
    let mut out = io::stdout().lock();
    write_envelope(env, cfg, &mut out)?;
    out.flush()
}

pub fn write_envelope(env: &Envelope, cfg: OutputConfig, w: &mut dyn Write) -> io::Result<()> {
    if cfg.pretty { serde_json::to_writer_pretty(&mut *w, env).map_err(to_io)?; }
    else { serde_json::to_writer(&mut *w, env).map_err(to_io)?; }
    writeln!(w)
}

fn to_io(e: serde_json::Error) -> io::Error { io::Error::new(io::ErrorKind::Other, e) }

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compact_envelope_is_one_line() {
        let env = Envelope::result("list", &json!({"total": 2}), None).unwrap();
        let mut buf = Vec::new();
        write_envelope(&env, OutputConfig { pretty: false }, &mut buf).unwrap();
        let s = String::from_utf8(buf).unwrap();
        assert_eq!(s.lines().count(), 1);
        assert!(s.contains("\"op\":\"list\""));
    }

    #[test]
    fn pretty_envelope_spans_lines() {
        let env = Envelope::result("list", &json!({"total": 2}), None).unwrap();
        let mut buf = Vec::new();
        write_envelope(&env, OutputConfig { pretty: true }, &mut buf).unwrap();
        assert!(String::from_utf8(buf).unwrap().lines().count() > 1);
    }
}
