//! Parsers for `/proc` filesystem files.
//!
//! These are pure functions over file contents, testable with string inputs.

use std::collections::HashMap;

use thiserror::Error;

/// Error type for parsing failures.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("parse error: {message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

/// Process state letter from `/proc/[pid]/stat` (`R`, `S`, `D`, `Z`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    Running,
    Sleeping,
    /// Uninterruptible sleep, usually blocked on I/O.
    DiskSleep,
    Zombie,
    Stopped,
    Idle,
    Other(char),
}

impl ProcState {
    pub fn from_char(c: char) -> Self {
        match c {
            'R' => ProcState::Running,
            'S' => ProcState::Sleeping,
            'D' => ProcState::DiskSleep,
            'Z' => ProcState::Zombie,
            'T' | 't' => ProcState::Stopped,
            'I' => ProcState::Idle,
            other => ProcState::Other(other),
        }
    }
}

/// The fields of `/proc/[pid]/stat` gdg cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcStat {
    pub pid: u32,
    pub comm: String,
    pub state: ProcState,
    pub ppid: u32,
}

/// Parses the head of `/proc/[pid]/stat`.
///
/// The comm field can contain spaces and parentheses, so it is delimited by
/// the first `(` and the last `)`.
/// Format: pid (comm) state ppid pgrp session tty_nr ...
pub fn parse_proc_stat(content: &str) -> Result<ProcStat, ParseError> {
    let content = content.trim();

    let open_paren = content
        .find('(')
        .ok_or_else(|| ParseError::new("missing '(' in stat"))?;
    let close_paren = content
        .rfind(')')
        .ok_or_else(|| ParseError::new("missing ')' in stat"))?;

    if close_paren <= open_paren {
        return Err(ParseError::new("invalid parentheses in stat"));
    }

    let pid: u32 = content[..open_paren]
        .trim()
        .parse()
        .map_err(|_| ParseError::new("invalid pid"))?;

    let comm = content[open_paren + 1..close_paren].to_string();

    let mut fields = content[close_paren + 1..].split_whitespace();
    let state = fields
        .next()
        .and_then(|s| s.chars().next())
        .ok_or_else(|| ParseError::new("missing state field"))?;
    let ppid = fields
        .next()
        .ok_or_else(|| ParseError::new("missing ppid field"))?
        .parse()
        .map_err(|_| ParseError::new("invalid ppid"))?;

    Ok(ProcStat {
        pid,
        comm,
        state: ProcState::from_char(state),
        ppid,
    })
}

/// Identity fields from `/proc/[pid]/status`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcStatus {
    pub name: String,
    pub pid: u32,
    pub uid: u32,
    pub euid: u32,
}

/// Parses `/proc/[pid]/status` content.
///
/// Format is key:\tvalue pairs, one per line. `Uid` is required; its value
/// is "real effective saved fs".
pub fn parse_proc_status(content: &str) -> Result<ProcStatus, ParseError> {
    let mut fields: HashMap<&str, &str> = HashMap::new();

    for line in content.lines() {
        if let Some((key, value)) = line.split_once(':') {
            fields.insert(key.trim(), value.trim());
        }
    }

    let uid_line = fields
        .get("Uid")
        .ok_or_else(|| ParseError::new("missing Uid in status"))?;
    let uids: Vec<u32> = uid_line
        .split_whitespace()
        .map(|s| s.parse().map_err(|_| ParseError::new("invalid Uid")))
        .collect::<Result<_, _>>()?;

    Ok(ProcStatus {
        name: fields.get("Name").unwrap_or(&"").to_string(),
        pid: fields.get("Pid").and_then(|s| s.parse().ok()).unwrap_or(0),
        uid: uids.first().copied().unwrap_or(0),
        euid: uids.get(1).copied().unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_proc_stat_basic() {
        let content = "1234 (bash) S 1233 1234 1234 34816 1235 4194304 5000 50000 10 20 100 50 200 100 20 0 1 0 100000 25000000 2000 18446744073709551615 0 0 0 0 0 0 65536 3670020 1266777851 0 0 0 17 2 0 0 5 0 0 0 0 0 0 0 0 0 0";
        let stat = parse_proc_stat(content).unwrap();

        assert_eq!(stat.pid, 1234);
        assert_eq!(stat.comm, "bash");
        assert_eq!(stat.state, ProcState::Sleeping);
        assert_eq!(stat.ppid, 1233);
    }

    #[test]
    fn test_parse_proc_stat_disk_sleep_with_spaces_in_comm() {
        let content = "5000 (Web Content) D 4999 5000 4999 0 -1 4194304 100000 0 500 0";
        let stat = parse_proc_stat(content).unwrap();

        assert_eq!(stat.comm, "Web Content");
        assert_eq!(stat.state, ProcState::DiskSleep);
    }

    #[test]
    fn test_parse_proc_stat_with_parentheses_in_comm() {
        let content = "5001 (test) D (1)) R 1 5001 5001 0 -1";
        let stat = parse_proc_stat(content).unwrap();

        assert_eq!(stat.comm, "test) D (1)");
        assert_eq!(stat.state, ProcState::Running);
    }

    #[test]
    fn test_parse_proc_stat_truncated() {
        assert!(parse_proc_stat("").is_err());
        assert!(parse_proc_stat("12 (sh)").is_err());
        assert!(parse_proc_stat("x (sh) S 1").is_err());
        assert!(parse_proc_stat("12 )sh( S 1").is_err());
    }

    #[test]
    fn test_proc_state_from_char() {
        assert_eq!(ProcState::from_char('D'), ProcState::DiskSleep);
        assert_eq!(ProcState::from_char('Z'), ProcState::Zombie);
        assert_eq!(ProcState::from_char('t'), ProcState::Stopped);
        assert_eq!(ProcState::from_char('X'), ProcState::Other('X'));
    }

    #[test]
    fn test_parse_proc_status() {
        let content = "\
Name:\tsudo
Pid:\t1234
PPid:\t1233
Uid:\t1000\t0\t0\t0
Gid:\t1000\t1000\t1000\t1000
";
        let status = parse_proc_status(content).unwrap();
        assert_eq!(status.name, "sudo");
        assert_eq!(status.pid, 1234);
        assert_eq!(status.uid, 1000);
        assert_eq!(status.euid, 0);
    }

    #[test]
    fn test_parse_proc_status_without_uid() {
        assert!(parse_proc_status("Name:\tbash\n").is_err());
    }
}
