//! 协议帧格式定义和编解码

use crate::protocol::constants::{Control, MessageType, PREFIX, PREFIX_RESP, RESPONSE_HEADER_LEN};
use bytes::BufMut;
use flate2::read::ZlibDecoder;
use std::io::Read;
use thiserror::Error;

/// 请求帧头长度（不含数据域）
pub const REQUEST_HEADER_LEN: usize = 12;

/// 请求帧
#[derive(Debug, Clone)]
pub struct RequestFrame {
    pub msg_id: u32,
    pub control: Control,
    pub msg_type: MessageType,
    pub data: Vec<u8>,
}

impl RequestFrame {
    pub fn new(msg_id: u32, msg_type: MessageType, data: Vec<u8>) -> Self {
        Self {
            msg_id,
            control: Control::Control01,
            msg_type,
            data,
        }
    }

    /// 编码为字节数组
    ///
    /// `0C | MsgID(4) | Control(1) | Length(2) | Length(2) | Type(2) | Data`，
    /// Length 包含 Type 的2字节。
    pub fn encode(&self) -> Vec<u8> {
        let length = (self.data.len() + 2) as u16;
        let mut buf = Vec::with_capacity(REQUEST_HEADER_LEN + self.data.len());
        buf.put_u8(PREFIX);
        buf.put_u32_le(self.msg_id);
        buf.put_u8(self.control.as_u8());
        buf.put_u16_le(length);
        buf.put_u16_le(length);
        buf.put_u16_le(self.msg_type.as_u16());
        buf.put_slice(&self.data);
        buf
    }

    /// 从字节数组解码（用于抓包比对）
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < REQUEST_HEADER_LEN {
            return Err(FrameError::InsufficientData);
        }
        if bytes[0] != PREFIX {
            return Err(FrameError::InvalidPrefix);
        }

        let msg_id = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        let length1 = u16::from_le_bytes([bytes[6], bytes[7]]);
        let length2 = u16::from_le_bytes([bytes[8], bytes[9]]);
        let msg_type_val = u16::from_le_bytes([bytes[10], bytes[11]]);

        if length1 != length2 {
            return Err(FrameError::LengthMismatch);
        }

        let data_length = length1.saturating_sub(2) as usize;
        if bytes.len() < REQUEST_HEADER_LEN + data_length {
            return Err(FrameError::InsufficientData);
        }

        let msg_type = MessageType::from_u16(msg_type_val)
            .ok_or(FrameError::UnknownMessageType(msg_type_val))?;

        Ok(Self {
            msg_id,
            control: Control::Control01,
            msg_type,
            data: bytes[REQUEST_HEADER_LEN..REQUEST_HEADER_LEN + data_length].to_vec(),
        })
    }
}

/// 响应帧头（16字节）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub control: u8,
    pub msg_id: u32,
    pub unknown: u8,
    pub msg_type: MessageType,
    pub zip_length: u16,
    pub length: u16,
}

impl ResponseHeader {
    /// `B1CB7400 | Control(1) | MsgID(4) | Unknown(1) | Type(2) | ZipLength(2) | Length(2)`
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < RESPONSE_HEADER_LEN {
            return Err(FrameError::InsufficientData);
        }

        let prefix = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if prefix != PREFIX_RESP {
            return Err(FrameError::InvalidPrefix);
        }

        let msg_type_val = u16::from_le_bytes([bytes[10], bytes[11]]);
        let msg_type = MessageType::from_u16(msg_type_val)
            .ok_or(FrameError::UnknownMessageType(msg_type_val))?;

        Ok(Self {
            control: bytes[4],
            msg_id: u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]),
            unknown: bytes[9],
            msg_type,
            zip_length: u16::from_le_bytes([bytes[12], bytes[13]]),
            length: u16::from_le_bytes([bytes[14], bytes[15]]),
        })
    }

    pub fn encode(&self) -> [u8; RESPONSE_HEADER_LEN] {
        let mut buf = Vec::with_capacity(RESPONSE_HEADER_LEN);
        buf.put_u32(PREFIX_RESP);
        buf.put_u8(self.control);
        buf.put_u32_le(self.msg_id);
        buf.put_u8(self.unknown);
        buf.put_u16_le(self.msg_type.as_u16());
        buf.put_u16_le(self.zip_length);
        buf.put_u16_le(self.length);
        let mut out = [0u8; RESPONSE_HEADER_LEN];
        out.copy_from_slice(&buf);
        out
    }
}

/// 响应帧
#[derive(Debug, Clone)]
pub struct ResponseFrame {
    pub header: ResponseHeader,
    pub data: Vec<u8>,
}

impl ResponseFrame {
    /// 由帧头和数据域组装，必要时解压
    pub fn from_parts(header: ResponseHeader, body: Vec<u8>) -> Result<Self, FrameError> {
        if body.len() != header.zip_length as usize {
            return Err(FrameError::LengthMismatch);
        }

        let data = if header.zip_length != header.length {
            let mut decoder = ZlibDecoder::new(body.as_slice());
            let mut inflated = Vec::with_capacity(header.length as usize);
            decoder
                .read_to_end(&mut inflated)
                .map_err(|e| FrameError::DecompressionError(e.to_string()))?;
            inflated
        } else {
            body
        };

        if data.len() != header.length as usize {
            return Err(FrameError::LengthMismatch);
        }

        Ok(Self { header, data })
    }

    /// 从完整字节数组解码
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let header = ResponseHeader::decode(bytes)?;
        let end = RESPONSE_HEADER_LEN + header.zip_length as usize;
        if bytes.len() < end {
            return Err(FrameError::InsufficientData);
        }
        Self::from_parts(header, bytes[RESPONSE_HEADER_LEN..end].to_vec())
    }

    pub fn msg_id(&self) -> u32 {
        self.header.msg_id
    }

    pub fn msg_type(&self) -> MessageType {
        self.header.msg_type
    }

    /// 解压后的数据域
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 检查响应是否成功
    pub fn is_success(&self) -> bool {
        self.header.control & 0x10 == 0x10
    }
}

/// 帧错误类型
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("数据长度不足")]
    InsufficientData,
    #[error("无效的帧头")]
    InvalidPrefix,
    #[error("长度不匹配")]
    LengthMismatch,
    #[error("未知的消息类型: 0x{0:04X}")]
    UnknownMessageType(u16),
    #[error("解压错误: {0}")]
    DecompressionError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn header(zip_length: u16, length: u16) -> ResponseHeader {
        ResponseHeader {
            control: 0x1C,
            msg_id: 7,
            unknown: 0,
            msg_type: MessageType::Count,
            zip_length,
            length,
        }
    }

    #[test]
    fn request_layout() {
        let frame = RequestFrame::new(3, MessageType::Count, vec![0x01, 0x02]);
        let bs = frame.encode();
        assert_eq!(
            bs,
            vec![0x0C, 0x03, 0x00, 0x00, 0x00, 0x01, 0x04, 0x00, 0x04, 0x00, 0x4E, 0x04, 0x01, 0x02]
        );
        let back = RequestFrame::decode(&bs).unwrap();
        assert_eq!(back.msg_id, 3);
        assert_eq!(back.msg_type, MessageType::Count);
        assert_eq!(back.data, vec![0x01, 0x02]);
    }

    #[test]
    fn response_plain() {
        let mut bs = header(2, 2).encode().to_vec();
        assert_eq!(&bs[..4], &[0xB1, 0xCB, 0x74, 0x00]);
        bs.extend_from_slice(&[0xC8, 0x01]);
        let frame = ResponseFrame::decode(&bs).unwrap();
        assert!(frame.is_success());
        assert_eq!(frame.msg_id(), 7);
        assert_eq!(frame.data(), &[0xC8, 0x01]);
    }

    #[test]
    fn response_zlib() {
        let payload = vec![0x5Au8; 300];
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&payload).unwrap();
        let zipped = enc.finish().unwrap();

        let h = header(zipped.len() as u16, payload.len() as u16);
        let frame = ResponseFrame::from_parts(h, zipped).unwrap();
        assert_eq!(frame.data(), payload.as_slice());
    }

    #[test]
    fn response_errors() {
        assert!(matches!(
            ResponseHeader::decode(&[0u8; 8]),
            Err(FrameError::InsufficientData)
        ));
        let mut bs = header(2, 2).encode().to_vec();
        bs[0] = 0x00;
        assert!(matches!(ResponseHeader::decode(&bs), Err(FrameError::InvalidPrefix)));

        let h = header(2, 3);
        assert!(matches!(
            ResponseFrame::from_parts(h, vec![1, 2, 3]),
            Err(FrameError::LengthMismatch)
        ));
        assert!(matches!(
            ResponseFrame::from_parts(h, vec![1, 2]),
            Err(FrameError::DecompressionError(_) | FrameError::LengthMismatch)
        ));
    }
}
