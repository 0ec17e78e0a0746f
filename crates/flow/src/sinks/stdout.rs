use async_trait::async_trait;
use std::io::Write;

use super::Sink;
use crate::Result;

#[derive(Debug)]
pub struct StdoutSink {
    name: String,
    header: Option<String>,
}

impl StdoutSink {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            header: None,
        }
    }

    /// Print a banner line before each message.
    pub fn with_header(mut self, header: &str) -> Self {
        self.header = Some(header.to_string());
        self
    }

    fn format(&self, content: &str) -> String {
        match &self.header {
            Some(header) => format!("==== {} ====\n{}\n", header, content),
            None => format!("{}\n", content),
        }
    }
}

#[async_trait]
impl Sink for StdoutSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, content: &str) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(self.format(content).as_bytes())?;
        stdout.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_with_header() {
        let sink = StdoutSink::new("report").with_header("Max retry count exceeded");
        assert_eq!(sink.name(), "report");
        assert_eq!(
            sink.format("article: x"),
            "==== Max retry count exceeded ====\narticle: x\n"
        );
        assert_eq!(StdoutSink::new("plain").format("hi"), "hi\n");
    }

    #[tokio::test]
    async fn test_send_succeeds() {
        StdoutSink::new("plain").send("hello from a test").await.unwrap();
    }
}
