//! 单跳请求
//! HEAD 优先，服务器拒绝 HEAD（4xx/5xx）时回退到 GET；从不自动跟随重定向

use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use reqwest::{Client, Method, Response};
use tracing::trace;
use url::Url;

use crate::config::EngineConfig;
use crate::error::{PurlError, PurlResult};

/// 一跳的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hop {
    /// 3xx，附带原始 `Location`（可能是相对地址）
    Redirect(String),
    /// 非重定向的成功响应：当前地址就是终点
    Final,
}

/// 单跳请求接口（便于替换为测试用的合成实现）
#[async_trait]
pub trait HopFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> PurlResult<Hop>;
}

/// 基于 reqwest 的实现
#[derive(Debug, Clone)]
pub struct HttpHopFetcher {
    client: Client,
}

impl HttpHopFetcher {
    pub fn new(config: &EngineConfig) -> PurlResult<Self> {
        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(config.redirect_timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self { client })
    }

    /// 使用调用方提供的 client（必须关闭自动重定向）
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn send(&self, method: Method, url: &Url) -> PurlResult<Response> {
        let response = self.client.request(method.clone(), url.clone()).send().await?;
        trace!("{} {} -> {}", method, url, response.status());
        Ok(response)
    }
}

#[async_trait]
impl HopFetcher for HttpHopFetcher {
    async fn fetch(&self, url: &Url) -> PurlResult<Hop> {
        let mut response = self.send(Method::HEAD, url).await?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            response = self.send(Method::GET, url).await?;
        }

        let status = response.status();
        if status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .ok_or_else(|| {
                    PurlError::RedirectResolution(format!("{} from {} without Location", status, url))
                })?;
            return Ok(Hop::Redirect(location.to_string()));
        }
        if status.is_success() {
            return Ok(Hop::Final);
        }
        Err(PurlError::RedirectResolution(format!("{} answered {}", url, status)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// 极简 HTTP 应答器：按 (方法, 路径) 返回状态行与可选 Location
    async fn spawn_server(routes: fn(&str, &str) -> (u16, Option<String>)) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let request = String::from_utf8_lossy(&buf);
                    let mut parts = request.split_whitespace();
                    let method = parts.next().unwrap_or_default().to_string();
                    let path = parts.next().unwrap_or_default().to_string();
                    let (code, location) = routes(&method, &path);
                    let mut reply = format!("HTTP/1.1 {} X\r\nContent-Length: 0\r\nConnection: close\r\n", code);
                    if let Some(location) = location {
                        reply.push_str(&format!("Location: {}\r\n", location));
                    }
                    reply.push_str("\r\n");
                    let _ = socket.write_all(reply.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{}", addr)
    }

    fn fetcher() -> HttpHopFetcher {
        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(Duration::from_secs(2))
            .no_proxy()
            .build()
            .unwrap();
        HttpHopFetcher::with_client(client)
    }

    #[tokio::test]
    async fn test_head_rejected_falls_back_to_get() {
        let base = spawn_server(|method, path| match (method, path) {
            ("HEAD", "/short") => (405, None),
            ("GET", "/short") => (302, Some("/landing".to_string())),
            (_, "/landing") => (200, None),
            _ => (404, None),
        })
        .await;
        let fetcher = fetcher();

        let start = Url::parse(&format!("{}/short", base)).unwrap();
        assert_eq!(fetcher.fetch(&start).await.unwrap(), Hop::Redirect("/landing".to_string()));
        let landing = Url::parse(&format!("{}/landing", base)).unwrap();
        assert_eq!(fetcher.fetch(&landing).await.unwrap(), Hop::Final);
        let missing = Url::parse(&format!("{}/gone", base)).unwrap();
        assert!(fetcher.fetch(&missing).await.is_err());
    }

    #[tokio::test]
    async fn test_redirect_without_location_is_error() {
        let base = spawn_server(|_, _| (301, None)).await;
        let url = Url::parse(&format!("{}/x", base)).unwrap();
        let err = fetcher().fetch(&url).await.unwrap_err();
        assert!(matches!(err, PurlError::RedirectResolution(_)));
    }
}
