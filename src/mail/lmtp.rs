//! Minimal LMTP client (RFC 2033) over a UNIX socket.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;

use log::{debug, warn};

use crate::domain::mail::MailRecord;
use crate::error::{Error, Result};
use crate::mail::sink::MailSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl Reply {
    pub fn is_positive(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn message(&self) -> String {
        self.lines.join(" ")
    }
}

/// Delivers each message as its own envelope to an LMTP server.
pub struct LmtpSink<S: Read + Write> {
    stream: BufReader<S>,
}

impl LmtpSink<UnixStream> {
    pub fn connect(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path)
            .map_err(|e| Error::io(format!("dialing LMTP server {}", path.display()), e))?;
        Self::new(stream)
    }
}

impl<S: Read + Write> LmtpSink<S> {
    /// Reads the greeting and introduces ourselves.
    pub fn new(stream: S) -> Result<Self> {
        let mut sink = Self {
            stream: BufReader::new(stream),
        };
        let greeting = sink.read_reply("greeting")?;
        if greeting.code != 220 {
            return Err(Error::Lmtp {
                command: "greeting",
                code: greeting.code,
                message: greeting.message(),
            });
        }
        sink.command("LHLO", "LHLO localhost", 2)?;
        Ok(sink)
    }

    fn command(&mut self, name: &'static str, line: &str, class: u16) -> Result<Reply> {
        debug!("LMTP > {line}");
        let writer = self.stream.get_mut();
        writer
            .write_all(format!("{line}\r\n").as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|e| Error::io(format!("LMTP {name}"), e))?;
        let reply = self.read_reply(name)?;
        if reply.code / 100 != class {
            return Err(Error::Lmtp {
                command: name,
                code: reply.code,
                message: reply.message(),
            });
        }
        Ok(reply)
    }

    fn read_reply(&mut self, name: &'static str) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            let n = self
                .stream
                .read_line(&mut line)
                .map_err(|e| Error::io(format!("LMTP {name}"), e))?;
            if n == 0 {
                return Err(Error::io(
                    format!("LMTP {name}"),
                    io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"),
                ));
            }
            let line = line.trim_end_matches(['\r', '\n']);
            let code = line
                .get(..3)
                .and_then(|c| c.parse::<u16>().ok())
                .ok_or_else(|| Error::Lmtp {
                    command: name,
                    code: 0,
                    message: format!("malformed reply {line:?}"),
                })?;
            debug!("LMTP < {line}");
            lines.push(line.get(4..).unwrap_or("").to_string());
            if line.as_bytes().get(3) != Some(&b'-') {
                return Ok(Reply { code, lines });
            }
        }
    }
}

impl<S: Read + Write> MailSink for LmtpSink<S> {
    fn deliver(&mut self, mail: MailRecord<'_>, recipient: &str) -> Result<()> {
        self.command("MAIL", "MAIL FROM:<>", 2)?;
        self.command("RCPT", &format!("RCPT TO:<{recipient}>"), 2)?;
        self.command("DATA", "DATA", 3)?;

        let mut data = DataWriter::new(self.stream.get_mut());
        io::copy(mail.content, &mut data)
            .and_then(|_| data.finish())
            .map_err(|e| Error::io("LMTP DATA", e))?;

        // LMTP answers once per accepted recipient; we only ever have one.
        let status = self.read_reply("DATA")?;
        if !status.is_positive() {
            warn!(
                "LMTP error for {recipient} on message {}: {} {}",
                mail.id,
                status.code,
                status.message()
            );
        }

        self.command("RSET", "RSET", 2)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.command("QUIT", "QUIT", 2).map(|_| ())
    }
}

/// Dot-stuffs a message body and normalises line endings to CRLF.
pub struct DataWriter<W: Write> {
    inner: W,
    at_line_start: bool,
    after_cr: bool,
}

impl<W: Write> DataWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            at_line_start: true,
            after_cr: false,
        }
    }

    /// Terminates the body with `CRLF.CRLF`.
    pub fn finish(&mut self) -> io::Result<()> {
        if !self.at_line_start {
            self.inner.write_all(b"\r\n")?;
        }
        self.inner.write_all(b".\r\n")?;
        self.inner.flush()
    }
}

impl<W: Write> Write for DataWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut out = Vec::with_capacity(buf.len() + buf.len() / 64 + 2);
        for &b in buf {
            if b == b'\n' && !self.after_cr {
                out.push(b'\r');
            }
            if self.at_line_start && b == b'.' {
                out.push(b'.');
            }
            out.push(b);
            self.at_line_start = b == b'\n';
            self.after_cr = b == b'\r';
        }
        self.inner.write_all(&out)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
