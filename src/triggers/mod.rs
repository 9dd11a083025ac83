mod http;

pub use http::{connect, disconnect, send, SendRequest, CONNECTION_ID_HEADER, ROOM_ID_HEADER};
