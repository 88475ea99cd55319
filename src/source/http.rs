use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, instrument};

use crate::error::FetchError;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const ACCEPT_LANGUAGES: &str = "es-MX,es;q=0.9,pt-BR;q=0.8,en-US;q=0.7,en;q=0.6";

/// Shared HTTP client. Every request carries the configured timeout.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGES));

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }

    #[instrument(skip(self))]
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = send(self.client.get(url), url).await?;
        response.text().await.map_err(transport(url))
    }

    #[instrument(skip(self))]
    pub async fn get_bytes(&self, url: &str) -> Result<Bytes, FetchError> {
        let response = send(self.client.get(url), url).await?;
        response.bytes().await.map_err(transport(url))
    }

    #[instrument(skip(self))]
    pub async fn post_form_text(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<String, FetchError> {
        let response = send(self.client.post(url).form(form), url).await?;
        response.text().await.map_err(transport(url))
    }
}

async fn send(request: RequestBuilder, url: &str) -> Result<Response, FetchError> {
    let response = request.send().await.map_err(transport(url))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
        });
    }

    debug!(%status, "response received");
    Ok(response)
}

fn transport(url: &str) -> impl FnOnce(reqwest::Error) -> FetchError + '_ {
    move |source| FetchError::Transport {
        url: url.to_string(),
        source,
    }
}

/// A throwaway HTTP/1.1 server on a local port, for exercising clients.
#[cfg(test)]
pub(crate) mod test_server {
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Status and body to answer with, or `None` to hang up without answering.
    pub type Reply = Option<(u16, String)>;

    /// Answer every request with `respond(path, body)`. Returns the base URL.
    pub async fn serve<F>(respond: F) -> String
    where
        F: Fn(&str, &str) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let respond = Arc::new(respond);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let respond = Arc::clone(&respond);
                tokio::spawn(async move {
                    let Some((path, body)) = read_request(&mut socket).await else {
                        return;
                    };
                    let Some((status, body)) = respond(&path, &body) else {
                        return;
                    };

                    let response = format!(
                        "HTTP/1.1 {status} Test\r\ncontent-type: text/html; charset=utf-8\r\n\
                         content-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://{address}")
    }

    async fn read_request(socket: &mut TcpStream) -> Option<(String, String)> {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let read = socket.read(&mut chunk).await.ok()?;
            if read == 0 {
                return None;
            }
            buffer.extend_from_slice(&chunk[..read]);
            if let Some(i) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
                break i + 4;
            }
        };

        let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
        let path = head.split_whitespace().nth(1)?.to_string();
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);

        while buffer.len() < header_end + length {
            let read = socket.read(&mut chunk).await.ok()?;
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);
        }

        let body = String::from_utf8_lossy(&buffer[header_end..]).to_string();
        Some((path, body))
    }

    /// Decoded field of an `application/x-www-form-urlencoded` body.
    pub fn form_field(body: &str, name: &str) -> Option<String> {
        body.split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.replace('+', " ").replace("%3A", ":"))
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use crate::error::FetchError;
    use crate::source::http::test_server::serve;
    use crate::source::http::HttpClient;

    fn client() -> HttpClient {
        HttpClient::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    pub async fn test_success_returns_body() {
        let base = serve(|path, _| Some((200, format!("you asked for {path}")))).await;

        let text = client().get_text(&format!("{base}/guide")).await.unwrap();
        assert_eq!(text, "you asked for /guide");
    }

    #[tokio::test]
    pub async fn test_error_status() {
        let base = serve(|_, _| Some((500, "boom".to_string()))).await;
        let url = format!("{base}/guide");

        match client().get_text(&url).await {
            Err(FetchError::Status { url: failed, status }) => {
                assert_eq!(failed, url);
                assert_eq!(status.as_u16(), 500);
            }
            other => panic!("expected a status error, got {other:?}"),
        }

        let posted = client().post_form_text(&url, &[("a", "1")]).await;
        assert!(matches!(posted, Err(FetchError::Status { .. })));
    }

    #[tokio::test]
    pub async fn test_dropped_connection() {
        let base = serve(|_, _| None).await;

        let result = client().get_bytes(&format!("{base}/guide")).await;
        assert!(matches!(result, Err(FetchError::Transport { .. })));
    }
}
