use std::{fmt::Display, net::SocketAddr, str::FromStr};

use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream, ToSocketAddrs,
    },
};

use super::message::DecodeError;

// longer lines are a framing violation
pub const MAX_MESSAGE_SIZE: usize = 1024;

#[derive(thiserror::Error, Debug)]
pub enum ConnectionError {
    #[error("{0}")]
    Io(#[from] tokio::io::Error),

    #[error("message is longer than the allowed maximum")]
    TooLong,
}

/// A newline framed message stream
///
/// every message occupies exactly one line on the wire, which gives the
/// delimited text protocol the message boundaries it lacks on its own.
pub struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    peer: SocketAddr,
    // bytes of a line that hasn't been completed yet
    pending: Vec<u8>,
}

impl Connection {
    pub fn new(stream: TcpStream) -> tokio::io::Result<Self> {
        let peer = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();

        Ok(Self {
            reader: BufReader::new(reader),
            writer,
            peer,
            pending: Vec::new(),
        })
    }

    pub async fn connect<A: ToSocketAddrs>(addr: A) -> tokio::io::Result<Self> {
        Self::new(TcpStream::connect(addr).await?)
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Reads a single line from the connection
    ///
    /// returns None once the peer has closed its side of the stream.
    /// a final line that isn't terminated by a newline is still returned.
    ///
    /// this method is cancellation safe, a partially read line is kept
    /// and completed by the next call.
    pub async fn read_line(&mut self) -> Result<Option<String>, ConnectionError> {
        // leave room for the newline itself
        let limit = (MAX_MESSAGE_SIZE + 1).saturating_sub(self.pending.len()) as u64;

        (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut self.pending)
            .await?;

        let raw = std::mem::take(&mut self.pending);
        if raw.is_empty() {
            return Ok(None); // EOF
        }

        if raw.last() != Some(&b'\n') && raw.len() > MAX_MESSAGE_SIZE {
            return Err(ConnectionError::TooLong);
        }

        // a bad encoding will be caught when the identifier is parsed
        let line = String::from_utf8_lossy(&raw)
            .trim_end_matches(&['\r', '\n'][..])
            .to_owned();
        Ok(Some(line))
    }

    /// Reads and decodes the next message
    ///
    /// the outer result reports transport failures, the inner one decoding failures.
    pub async fn read_message<M>(&mut self) -> Result<Option<Result<M, DecodeError>>, ConnectionError>
    where
        M: FromStr<Err = DecodeError>,
    {
        Ok(self.read_line().await?.map(|line| line.parse()))
    }

    /// Writes a message followed by a newline in a single write
    pub async fn send<M: Display>(&mut self, message: &M) -> Result<(), ConnectionError> {
        let mut line = message.to_string();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;

        Ok(())
    }

    /// Closes the write side of the connection, the read side is closed on drop
    pub async fn shutdown(mut self) -> tokio::io::Result<()> {
        self.writer.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::{
        io::AsyncWriteExt,
        net::{TcpListener, TcpStream},
    };

    use super::{Connection, ConnectionError, MAX_MESSAGE_SIZE};
    use crate::protocol::{DecodeError, Request, Response, Seat};

    async fn pair() -> (TcpStream, Connection) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (client, server) = tokio::join!(TcpStream::connect(addr), listener.accept());
        (client.unwrap(), Connection::new(server.unwrap().0).unwrap())
    }

    #[tokio::test]
    async fn splits_lines() {
        let (mut raw, mut conn) = pair().await;

        raw.write_all(b"11\n12|1|2\r\n\n13|0").await.unwrap();
        raw.shutdown().await.unwrap();

        assert_eq!(conn.read_line().await.unwrap().as_deref(), Some("11"));
        assert_eq!(conn.read_line().await.unwrap().as_deref(), Some("12|1|2"));
        assert_eq!(conn.read_line().await.unwrap().as_deref(), Some(""));
        // unterminated line right before EOF
        assert_eq!(conn.read_line().await.unwrap().as_deref(), Some("13|0"));
        assert_eq!(conn.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn decodes_messages() {
        let (mut raw, mut conn) = pair().await;

        raw.write_all(b"13|2|3\nabc\n").await.unwrap();
        drop(raw);

        assert_eq!(
            conn.read_message::<Request>().await.unwrap(),
            Some(Ok(Request::Purchase(Seat::new(2, 3))))
        );
        assert_eq!(
            conn.read_message::<Request>().await.unwrap(),
            Some(Err(DecodeError::NonNumericIdentifier("abc".into())))
        );
        assert_eq!(conn.read_message::<Request>().await.unwrap(), None);
    }

    #[tokio::test]
    async fn rejects_long_lines() {
        let (mut raw, mut conn) = pair().await;

        // exactly at the limit is still fine
        let mut line = vec![b'1'; MAX_MESSAGE_SIZE];
        line.push(b'\n');
        raw.write_all(&line).await.unwrap();
        assert_eq!(
            conn.read_line().await.unwrap().map(|line| line.len()),
            Some(MAX_MESSAGE_SIZE)
        );

        raw.write_all(&vec![b'1'; MAX_MESSAGE_SIZE + 10]).await.unwrap();
        assert!(matches!(conn.read_line().await, Err(ConnectionError::TooLong)));
    }

    #[tokio::test]
    async fn resumes_cancelled_reads() {
        let (mut raw, mut conn) = pair().await;

        raw.write_all(b"13|1").await.unwrap();
        let cancelled =
            tokio::time::timeout(Duration::from_millis(50), conn.read_line()).await;
        assert!(cancelled.is_err());

        raw.write_all(b"|2\n").await.unwrap();
        assert_eq!(conn.read_line().await.unwrap().as_deref(), Some("13|1|2"));
    }

    #[tokio::test]
    async fn sends_one_line_per_message() {
        let (raw, mut conn) = pair().await;
        let mut client = Connection::new(raw).unwrap();

        conn.send(&Response::TicketAvailable).await.unwrap();
        conn.send(&Response::disconnect("bye")).await.unwrap();
        conn.shutdown().await.unwrap();

        assert_eq!(client.read_line().await.unwrap().as_deref(), Some("5"));
        assert_eq!(
            client.read_message::<Response>().await.unwrap(),
            Some(Ok(Response::disconnect("bye")))
        );
        assert_eq!(client.read_line().await.unwrap(), None);
    }
}
