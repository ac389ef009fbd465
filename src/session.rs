
use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_TIMEOUT_MS: u64 = 25_000;

/// A stateful, exclusive command/response channel to one physical instrument.
///
/// Both reads and writes are newline-terminated. A session is owned by exactly one driver
/// for its whole lifetime; once closed it accepts no further traffic.
pub trait Session {
    /// Send one command line (the terminator is appended here)
    fn write(&mut self, cmd: &str) -> Result<()>;

    /// Read one response line, without its terminator
    fn read_line(&mut self) -> Result<String>;

    /// Send a command and read the single response line it produces
    fn query(&mut self, cmd: &str) -> Result<String> {
        self.write(cmd)?;
        self.read_line()
    }

    /// Shut the channel down. Idempotent.
    fn close(&mut self) -> Result<()>;
}

/// Blocking TCP implementation of [`Session`], for instruments that expose a raw
/// socket on a fixed port.
pub struct TcpSession {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
    open: bool,
}

impl TcpSession {
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        Self::connect_with_timeout(host, port, Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }

    pub fn connect_with_timeout(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let stream = TcpStream::connect((host, port))?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;

        let reader = BufReader::new(stream.try_clone()?);

        Ok(Self { stream, reader, open: true })
    }

    fn check_open(&self) -> Result<()> {
        if self.open { Ok(()) } else { Err(Error::SessionClosed) }
    }
}

impl Session for TcpSession {
    fn write(&mut self, cmd: &str) -> Result<()> {
        self.check_open()?;

        self.stream.write_all(cmd.as_bytes())?;
        self.stream.write_all(b"\n")?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<String> {
        self.check_open()?;

        let mut line = String::new();
        let n = self.reader.read_line(&mut line)?;
        if n == 0 {
            return Err(Error::Connection(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "instrument closed the connection",
            )));
        }

        if line.ends_with('\n') {
            line.pop();
        }
        Ok(line)
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            // NotConnected just means the peer beat us to it
            match self.stream.shutdown(Shutdown::Both) {
                Err(ref e) if e.kind() != std::io::ErrorKind::NotConnected => {
                    return Err(Error::Connection(std::io::Error::new(e.kind(), e.to_string())));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl Drop for TcpSession {
    fn drop(&mut self) {
        let _ = self.close();
    }
}


#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;

    use super::{Session, TcpSession};
    use crate::error::Error;

    /// One-shot loopback instrument: answers every line with a canned response.
    fn spawn_responder(replies: Vec<(&'static str, &'static str)>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut stream = stream;
            for (expected, reply) in replies {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 {
                    return;
                }
                assert_eq!(line.trim_end(), expected);
                stream.write_all(reply.as_bytes()).unwrap();
                stream.write_all(b"\n").unwrap();
            }
        });

        port
    }

    #[test]
    fn query_round_trip() {
        let port = spawn_responder(vec![("*IDN?", "FLUKE,DMM4050,12345,1.0")]);
        let mut session = TcpSession::connect("127.0.0.1", port).unwrap();

        let idn = session.query("*IDN?").unwrap();
        assert_eq!(idn, "FLUKE,DMM4050,12345,1.0");
    }

    #[test]
    fn closed_session_rejects_traffic() {
        let port = spawn_responder(vec![]);
        let mut session = TcpSession::connect("127.0.0.1", port).unwrap();

        session.close().unwrap();
        assert!(matches!(session.write("*RST"), Err(Error::SessionClosed)));
        assert!(matches!(session.read_line(), Err(Error::SessionClosed)));
        // Closing twice is fine
        assert!(session.close().is_ok());
    }
}
