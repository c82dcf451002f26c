use super::*;

use protocol_common::{Compose, Parse};

use core::marker::PhantomData;

/// A `ServerSession` pairs a `Session` with a parser, yielding received
/// messages and composing responses into the session's write buffer.
pub struct ServerSession<Parser, Tx, Rx> {
    session: Session,
    parser: Parser,
    _rx: PhantomData<Rx>,
    _tx: PhantomData<Tx>,
}

impl<Parser, Tx, Rx> Debug for ServerSession<Parser, Tx, Rx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        write!(f, "{:?}", self.session)
    }
}

impl<Parser, Tx, Rx> ServerSession<Parser, Tx, Rx>
where
    Tx: Compose,
    Parser: Parse<Rx>,
{
    /// Create a new `ServerSession` from a `Session` and a `Parser`.
    pub fn new(session: Session, parser: Parser) -> Self {
        Self {
            session,
            parser,
            _rx: PhantomData,
            _tx: PhantomData,
        }
    }

    /// Consume the `ServerSession` and return the inner `Session`.
    pub fn into_inner(self) -> Session {
        self.session
    }

    /// Attempt to parse a single message from the current session buffer.
    pub fn receive(&mut self) -> Result<Rx> {
        let src: &[u8] = self.session.borrow();
        let res = self.parser.parse(src)?;
        let consumed = res.consumed();
        let msg = res.into_inner();
        self.session.consume(consumed);
        Ok(msg)
    }

    /// Compose a message into the session's write buffer.
    pub fn send(&mut self, tx: Tx) -> Result<usize> {
        SESSION_SEND.increment();
        Ok(tx.compose(&mut self.session))
    }

    /// Attempt to flush the write buffer to the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        self.session.flush()?;
        Ok(())
    }

    /// Returns the number of bytes pending in the read buffer.
    pub fn read_pending(&self) -> usize {
        self.session.read_pending()
    }

    /// Returns the number of bytes pending in the write buffer.
    pub fn write_pending(&self) -> usize {
        self.session.write_pending()
    }

    /// Reads from the underlying stream into the read buffer and returns the
    /// number of bytes read.
    pub fn fill(&mut self) -> Result<usize> {
        self.session.fill()
    }

    /// Returns the current event interest for this session.
    pub fn interest(&self) -> Interest {
        self.session.interest()
    }
}

impl<Parser, Tx, Rx> Borrow<[u8]> for ServerSession<Parser, Tx, Rx> {
    fn borrow(&self) -> &[u8] {
        self.session.borrow()
    }
}

impl<Parser, Tx, Rx> event::Source for ServerSession<Parser, Tx, Rx> {
    fn register(&mut self, registry: &Registry, token: Token, interest: Interest) -> Result<()> {
        self.session.register(registry, token, interest)
    }

    fn reregister(&mut self, registry: &Registry, token: Token, interest: Interest) -> Result<()> {
        self.session.reregister(registry, token, interest)
    }

    fn deregister(&mut self, registry: &Registry) -> Result<()> {
        self.session.deregister(registry)
    }
}
