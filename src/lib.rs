//! Client-side SPDY/3.1 session multiplexer.
//!
//! A [`Session`](session::Session) demultiplexes one transport connection
//! into many concurrent request/response streams, enforcing the protocol's
//! dual-level (session and per-stream) flow control, concurrency limits,
//! and graceful shutdown. The [`connection`] module binds a session to any
//! tokio duplex transport and hands the application a clonable
//! [`Client`](connection::Client) handle.
//!
//! ```no_run
//! # async fn example() -> Result<(), spdy3::SessionError> {
//! use spdy3::{Config, Origin, Request, SettingsStore, connect};
//!
//! # let transport = tokio::io::duplex(1024).0;
//! let origin = Origin::new("https", "example.com", 443);
//! let (client, _pushes, connection) =
//!     connect(transport, origin, Config::default(), SettingsStore::new());
//! tokio::spawn(connection.run());
//!
//! let mut response = client.queue(Request::new(vec![
//!     (b":method".to_vec(), b"GET".to_vec()),
//!     (b":path".to_vec(), b"/".to_vec()),
//! ]));
//! while let Some(_event) = response.event().await {
//!     // Reply, Header, Data, and finally Closed.
//! }
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod connection;
pub mod encode;
pub mod error;
pub mod flags;
pub mod frames;
pub mod parsers;
pub mod session;
pub mod settings;
pub mod stream;
pub mod table;
pub mod zlib;

pub use connection::{Client, Connection, PushReceiver, StreamHandle, connect};
pub use error::{SessionError, StreamError};
pub use frames::{GoAwayStatus, StreamStatus};
pub use session::{Config, PushedStream, Request};
pub use settings::{Origin, SettingsStore};
pub use stream::StreamEvent;
