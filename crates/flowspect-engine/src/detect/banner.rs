//! Banner and command-shape checks for SSH, FTP, SMTP, IMAP and POP3.
//!
//! These recognizers only tag the protocol; none of them extracts a domain.
//! They inspect the first line of the payload, so they work on both the
//! client command and the server greeting side of a flow.

fn first_line(data: &[u8]) -> &[u8] {
    let end = data
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(data.len());
    &data[..end]
}

fn starts_with_ignore_case(data: &[u8], prefix: &[u8]) -> bool {
    data.len() >= prefix.len() && data[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn contains_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack
        .windows(needle.len())
        .any(|w| w.eq_ignore_ascii_case(needle))
}

/// SSH identification string, e.g. `SSH-2.0-OpenSSH_9.6`.
pub fn is_ssh(data: &[u8]) -> bool {
    data.starts_with(b"SSH-")
}

/// FTP client command or `220` server banner mentioning FTP.
pub fn is_ftp(data: &[u8]) -> bool {
    const COMMANDS: &[&[u8]] = &[
        b"USER ", b"PASS ", b"RETR ", b"STOR ", b"LIST", b"CWD ", b"PASV", b"TYPE ", b"FEAT",
        b"QUIT",
    ];
    let line = first_line(data);
    if COMMANDS.iter().any(|c| starts_with_ignore_case(line, c)) {
        return true;
    }
    (line.starts_with(b"220 ") || line.starts_with(b"220-")) && contains_ignore_case(line, b"ftp")
}

/// SMTP client command or `220` server banner mentioning SMTP/ESMTP.
pub fn is_smtp(data: &[u8]) -> bool {
    const COMMANDS: &[&[u8]] = &[b"EHLO ", b"HELO ", b"MAIL FROM:", b"RCPT TO:", b"STARTTLS"];
    let line = first_line(data);
    if COMMANDS.iter().any(|c| starts_with_ignore_case(line, c)) {
        return true;
    }
    (line.starts_with(b"220 ") || line.starts_with(b"220-")) && contains_ignore_case(line, b"smtp")
}

/// IMAP untagged greeting or tagged command.
pub fn is_imap(data: &[u8]) -> bool {
    let line = first_line(data);
    if starts_with_ignore_case(line, b"* OK")
        || starts_with_ignore_case(line, b"* PREAUTH")
        || starts_with_ignore_case(line, b"* BYE")
    {
        return true;
    }
    // Tagged command: alphanumeric tag, space, known verb.
    const VERBS: &[&[u8]] = &[
        b"LOGIN ", b"CAPABILITY", b"SELECT ", b"FETCH ", b"NOOP", b"LOGOUT",
    ];
    let mut parts = line.splitn(2, |&b| b == b' ');
    let tag = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or_default();
    !tag.is_empty()
        && tag.iter().all(|b| b.is_ascii_alphanumeric())
        && VERBS.iter().any(|v| starts_with_ignore_case(rest, v))
}

/// POP3 status line or command. USER/PASS-style commands are claimed by the
/// FTP check first in the dispatch order; this one keys on the unambiguous
/// shapes.
pub fn is_pop3(data: &[u8]) -> bool {
    const COMMANDS: &[&[u8]] = &[b"STAT", b"DELE ", b"UIDL", b"TOP "];
    let line = first_line(data);
    line.starts_with(b"+OK")
        || line.starts_with(b"-ERR")
        || COMMANDS.iter().any(|c| starts_with_ignore_case(line, c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssh_banner() {
        assert!(is_ssh(b"SSH-2.0-OpenSSH_9.6\r\n"));
        assert!(!is_ssh(b"ssh-2.0 lowercase is not the protocol"));
    }

    #[test]
    fn ftp_commands_and_banner() {
        assert!(is_ftp(b"USER anonymous\r\n"));
        assert!(is_ftp(b"PASV\r\n"));
        assert!(is_ftp(b"220 ProFTPD Server ready.\r\n"));
        assert!(!is_ftp(b"220 mail.example.com ESMTP Postfix\r\n"));
        assert!(!is_ftp(b"GET / HTTP/1.1\r\n"));
    }

    #[test]
    fn smtp_commands_and_banner() {
        assert!(is_smtp(b"EHLO client.example.com\r\n"));
        assert!(is_smtp(b"MAIL FROM:<a@example.com>\r\n"));
        assert!(is_smtp(b"220 mail.example.com ESMTP Postfix\r\n"));
        assert!(!is_smtp(b"220 ftp.example.com FTP server\r\n"));
    }

    #[test]
    fn imap_greeting_and_tagged_commands() {
        assert!(is_imap(b"* OK IMAP4rev1 ready\r\n"));
        assert!(is_imap(b"a001 LOGIN user pass\r\n"));
        assert!(is_imap(b"A2 CAPABILITY\r\n"));
        assert!(!is_imap(b"LOGIN without a tag\r\n"));
        assert!(!is_imap(b"+OK POP3 ready\r\n"));
    }

    #[test]
    fn pop3_status_lines() {
        assert!(is_pop3(b"+OK POP3 server ready\r\n"));
        assert!(is_pop3(b"-ERR no such message\r\n"));
        assert!(is_pop3(b"STAT\r\n"));
        assert!(!is_pop3(b"* OK IMAP4rev1 ready\r\n"));
    }
}
