//! Open-mode parsing, grounded on `zindosteg.cpp`'s anonymous `mode` struct.

use stegfs_common::StegError;

/// Parsed file open mode: which of create/read/write/append were
/// requested, plus a binary/text distinction carried for API parity (this
/// crate has no text-mode newline translation to apply, unlike the
/// scripting-language binding the original spec was extracted from).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMode {
    pub create: bool,
    pub read: bool,
    pub write: bool,
    pub append: bool,
    pub binary: bool,
}

impl FileMode {
    pub fn parse(mode_str: &str) -> Result<Self, StegError> {
        let mut m = if mode_str.is_empty() { "r" } else { mode_str }.to_string();
        let mut binary = false;
        if let Some(stripped) = m.strip_suffix('b') {
            binary = true;
            m = stripped.to_string();
        } else if let Some(stripped) = m.strip_suffix('t') {
            m = stripped.to_string();
        }

        let (create, read, write, append) = match m.as_str() {
            "r" => (false, true, false, false),
            "r+" => (false, true, true, false),
            "w" => (true, false, true, false),
            "w+" => (true, true, true, false),
            "a" => (false, false, true, true),
            "a+" => (false, true, true, true),
            other => return Err(StegError::other(format!("invalid mode: {other}"))),
        };

        Ok(Self {
            create,
            read,
            write,
            append,
            binary,
        })
    }

    pub fn to_mode_string(&self) -> String {
        let mut m = if self.append {
            if self.read { "a+" } else { "a" }.to_string()
        } else if self.read && self.write {
            if self.create { "w+" } else { "r+" }.to_string()
        } else if self.read {
            "r".to_string()
        } else {
            "w".to_string()
        };
        if self.binary {
            m.push('b');
        }
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode_is_read() {
        let m = FileMode::parse("").unwrap();
        assert_eq!(m, FileMode::parse("r").unwrap());
    }

    #[test]
    fn test_all_named_modes_parse() {
        for s in ["r", "r+", "w", "w+", "a", "a+"] {
            assert!(FileMode::parse(s).is_ok(), "mode {s} should parse");
        }
    }

    #[test]
    fn test_binary_suffix_strips_and_sets_flag() {
        let m = FileMode::parse("r+b").unwrap();
        assert!(m.binary);
        assert!(m.read && m.write);
    }

    #[test]
    fn test_invalid_mode_rejected() {
        assert!(FileMode::parse("x").is_err());
    }

    #[test]
    fn test_roundtrip_through_to_mode_string() {
        for s in ["r", "r+", "w", "w+", "a", "a+"] {
            let m = FileMode::parse(s).unwrap();
            assert_eq!(m.to_mode_string(), s);
        }
    }
}
