//! RPC functions.
//!
//! Each function serializes its constructor ID followed by its fields and
//! names its reply type through [`crate::RemoteCall::Return`].

use crate::deserialize::{Buffer, Result};
use crate::{Deserializable, Identifiable, RemoteCall, Serializable, enums};

// ─── MTProto service functions ───────────────────────────────────────────────

tl_function! {
    /// `ping#7abe77ec ping_id:long = Pong;`
    Ping = 0x7abe77ec { ping_id: i64 } -> enums::Pong
}

tl_function! {
    /// `ping_delay_disconnect#f3427b8c ping_id:long disconnect_delay:int = Pong;`
    ///
    /// Asks the server to close the connection if nothing arrives within
    /// `disconnect_delay` seconds.
    PingDelayDisconnect = 0xf3427b8c { ping_id: i64, disconnect_delay: i32 } -> enums::Pong
}

tl_function! {
    /// `get_future_salts#b921bd04 num:int = FutureSalts;`
    GetFutureSalts = 0xb921bd04 { num: i32 } -> enums::FutureSalts
}

tl_function! {
    /// `rpc_drop_answer#58e4a740 req_msg_id:long = RpcDropAnswer;`
    RpcDropAnswer = 0x58e4a740 { req_msg_id: i64 } -> enums::RpcDropAnswer
}

tl_function! {
    /// `destroy_session#e7512126 session_id:long = DestroySessionRes;`
    DestroySession = 0xe7512126 { session_id: i64 } -> enums::DestroySessionRes
}

// ─── Connection wrappers ─────────────────────────────────────────────────────

/// `invokeWithLayer#da9b0d0d {X:Type} layer:int query:!X = X;`
#[derive(Clone, Debug, PartialEq)]
pub struct InvokeWithLayer<X> {
    pub layer: i32,
    pub query: X,
}

impl<X> Identifiable for InvokeWithLayer<X> {
    const CONSTRUCTOR_ID: u32 = 0xda9b0d0d;
}

impl<X: Serializable> Serializable for InvokeWithLayer<X> {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        Self::CONSTRUCTOR_ID.serialize(buf);
        self.layer.serialize(buf);
        self.query.serialize(buf);
    }
}

impl<X: RemoteCall> RemoteCall for InvokeWithLayer<X> {
    type Return = X::Return;
}

impl<X: Deserializable> Deserializable for InvokeWithLayer<X> {
    fn deserialize(buf: Buffer) -> Result<Self> {
        let layer = i32::deserialize(buf)?;
        let query = X::deserialize(buf)?;
        Ok(Self { layer, query })
    }
}

/// `initConnection#c1cd5ec9 {X:Type} flags:# api_id:int device_model:string
/// system_version:string app_version:string system_lang_code:string
/// lang_pack:string lang_code:string proxy:flags.0?InputClientProxy
/// params:flags.1?JSONValue query:!X = X;`
///
/// `proxy` and `params` are never sent, so the flags word is always zero.
#[derive(Clone, Debug, PartialEq)]
pub struct InitConnection<X> {
    pub api_id: i32,
    pub device_model: String,
    pub system_version: String,
    pub app_version: String,
    pub system_lang_code: String,
    pub lang_pack: String,
    pub lang_code: String,
    pub query: X,
}

impl<X> Identifiable for InitConnection<X> {
    const CONSTRUCTOR_ID: u32 = 0xc1cd5ec9;
}

impl<X: Serializable> Serializable for InitConnection<X> {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        Self::CONSTRUCTOR_ID.serialize(buf);
        0u32.serialize(buf);
        self.api_id.serialize(buf);
        self.device_model.serialize(buf);
        self.system_version.serialize(buf);
        self.app_version.serialize(buf);
        self.system_lang_code.serialize(buf);
        self.lang_pack.serialize(buf);
        self.lang_code.serialize(buf);
        self.query.serialize(buf);
    }
}

impl<X: RemoteCall> RemoteCall for InitConnection<X> {
    type Return = X::Return;
}

impl<X: Deserializable> Deserializable for InitConnection<X> {
    fn deserialize(buf: Buffer) -> Result<Self> {
        let flags = u32::deserialize(buf)?;
        if flags != 0 {
            // proxy / params are outside the vocabulary.
            return Err(crate::deserialize::Error::UnknownConstructor { id: Self::CONSTRUCTOR_ID });
        }
        Ok(Self {
            api_id: i32::deserialize(buf)?,
            device_model: String::deserialize(buf)?,
            system_version: String::deserialize(buf)?,
            app_version: String::deserialize(buf)?,
            system_lang_code: String::deserialize(buf)?,
            lang_pack: String::deserialize(buf)?,
            lang_code: String::deserialize(buf)?,
            query: X::deserialize(buf)?,
        })
    }
}

// ─── help ────────────────────────────────────────────────────────────────────

pub mod help {
    use crate::enums;

    tl_function! {
        /// `help.getConfig#c4f9186b = Config;`
        GetConfig = 0xc4f9186b {} -> enums::Config
    }

    tl_function! {
        /// `help.getNearestDc#1fb33026 = NearestDc;`
        GetNearestDc = 0x1fb33026 {} -> enums::NearestDc
    }
}
