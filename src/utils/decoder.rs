//! 解码器链
//! `extractParam` 动作与 lambda 辅助函数共用：url / base64 / base64url

use std::str::FromStr;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use percent_encoding::percent_decode_str;

use crate::error::{PurlError, PurlResult};

// 填充可有可无：规则来源的数据经常省略 `=`
const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);
const BASE64_STANDARD: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const BASE64_URL_SAFE: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// 单个解码步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoder {
    /// 百分号解码（`+` 保留）
    Url,
    /// 标准字母表 base64
    Base64,
    /// URL 安全字母表 base64
    Base64Url,
}

impl FromStr for Decoder {
    type Err = PurlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "url" => Ok(Decoder::Url),
            "base64" => Ok(Decoder::Base64),
            "base64url" => Ok(Decoder::Base64Url),
            other => Err(PurlError::MalformedRule(format!("unknown decoder `{}`", other))),
        }
    }
}

impl Decoder {
    /// 执行解码
    pub fn apply(self, input: &str) -> PurlResult<String> {
        match self {
            Decoder::Url => Ok(percent_decode_str(input).decode_utf8_lossy().into_owned()),
            Decoder::Base64 => decode_base64(&BASE64_STANDARD, input),
            Decoder::Base64Url => decode_base64(&BASE64_URL_SAFE, input),
        }
    }

    /// 依次执行解码器链
    pub fn apply_chain(chain: &[Decoder], input: &str) -> PurlResult<String> {
        chain
            .iter()
            .try_fold(input.to_string(), |value, decoder| decoder.apply(&value))
    }
}

fn decode_base64(engine: &GeneralPurpose, input: &str) -> PurlResult<String> {
    let bytes = engine
        .decode(input.trim())
        .map_err(|e| PurlError::Transform(format!("base64 decode failed: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| PurlError::Transform(format!("decoded bytes are not utf-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decoder_names() {
        assert_eq!("URL".parse::<Decoder>().unwrap(), Decoder::Url);
        assert_eq!("base64".parse::<Decoder>().unwrap(), Decoder::Base64);
        assert_eq!(" base64url ".parse::<Decoder>().unwrap(), Decoder::Base64Url);
        assert!("rot13".parse::<Decoder>().is_err());
    }

    #[test]
    fn test_base64_with_and_without_padding() {
        // "https://a.b/" 编码
        assert_eq!(Decoder::Base64.apply("aHR0cHM6Ly9hLmIv").unwrap(), "https://a.b/");
        assert_eq!(Decoder::Base64.apply("aHR0cHM6Ly9hLmI=").unwrap(), "https://a.b");
        assert_eq!(Decoder::Base64.apply("aHR0cHM6Ly9hLmI").unwrap(), "https://a.b");
    }

    #[test]
    fn test_chain_url_then_base64() {
        let chain = [Decoder::Url, Decoder::Base64];
        assert_eq!(Decoder::apply_chain(&chain, "aHR0cHM6Ly9hLmI%3D").unwrap(), "https://a.b");
    }

    #[test]
    fn test_invalid_base64_is_transform_error() {
        let err = Decoder::Base64.apply("!!!").unwrap_err();
        assert!(err.is_transform_failure());
    }
}
