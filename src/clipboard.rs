//! Clipboard copy through an ordered chain of providers.

use std::{
    fmt,
    future::Future,
    io::ErrorKind,
    pin::Pin,
    process::Stdio,
    sync::{Mutex, PoisonError},
};

use tokio::{io::AsyncWriteExt, process::Command};

/// Boxed future returned by [`ClipboardProvider::write_text`].
pub type ProviderFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ProviderError>> + Send + 'a>>;

/// Why a single provider could not copy.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The mechanism does not exist in this environment; the chain moves on.
    #[error("unavailable: {0}")]
    Unavailable(String),
    /// The mechanism exists but the copy failed.
    #[error("failed: {0}")]
    Failed(String),
}

/// One provider's failure inside [`ClipboardError::AllFailed`].
#[derive(Debug)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: ProviderError,
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.error)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("no clipboard providers configured")]
    NoProviders,
    #[error("all clipboard copy methods failed: {}", format_failures(.failures))]
    AllFailed { failures: Vec<ProviderFailure> },
}

fn format_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Which provider performed a successful copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopyReceipt {
    pub provider: String,
    /// `true` when an earlier provider in the chain was skipped or failed.
    pub fallback_used: bool,
}

/// A single clipboard write mechanism.
pub trait ClipboardProvider: Send + Sync {
    fn name(&self) -> &str;

    fn write_text<'a>(&'a self, text: &'a str) -> ProviderFuture<'a>;
}

/// Tries providers in order and reports the first success.
#[derive(Default)]
pub struct ClipboardChain {
    providers: Vec<Box<dyn ClipboardProvider>>,
}

impl fmt::Debug for ClipboardChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("ClipboardChain")
            .field("providers", &names)
            .finish()
    }
}

impl ClipboardChain {
    /// Empty chain; [`copy`](Self::copy) fails with [`ClipboardError::NoProviders`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain of the platform's clipboard tools, preferred tool first.
    ///
    /// - Linux and other Unix: `wl-copy`, then `xclip`.
    /// - Windows: PowerShell `Set-Clipboard` (Unicode-safe), then `clip`.
    /// - macOS: `pbcopy` only. It ships with every macOS install, so there is
    ///   no legacy tool to fall back to; append a provider with
    ///   [`with_provider`](Self::with_provider) if one is needed.
    pub fn system() -> Self {
        let mut chain = Self::new();
        if cfg!(target_os = "macos") {
            chain = chain.with_provider(CommandClipboard::program("pbcopy"));
        } else if cfg!(windows) {
            chain = chain
                .with_provider(CommandClipboard::new(
                    "powershell",
                    ["-NoProfile", "-NonInteractive", "-Command", "$input | Set-Clipboard"],
                ))
                .with_provider(CommandClipboard::program("clip"));
        } else {
            chain = chain
                .with_provider(CommandClipboard::program("wl-copy"))
                .with_provider(CommandClipboard::new("xclip", ["-selection", "clipboard"]));
        }
        chain
    }

    /// Appends a provider to the end of the chain.
    pub fn with_provider(mut self, provider: impl ClipboardProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Number of providers in the chain.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Copies `text` with the first provider that succeeds.
    pub async fn copy(&self, text: &str) -> Result<CopyReceipt, ClipboardError> {
        if self.providers.is_empty() {
            return Err(ClipboardError::NoProviders);
        }

        let mut failures = Vec::new();
        for provider in &self.providers {
            match provider.write_text(text).await {
                Ok(()) => {
                    #[cfg(feature = "tracing")]
                    tracing::info!(provider = provider.name(), "copied to clipboard");

                    return Ok(CopyReceipt {
                        provider: provider.name().to_owned(),
                        fallback_used: !failures.is_empty(),
                    });
                }
                Err(error) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(provider = provider.name(), "clipboard provider failed: {error}");

                    failures.push(ProviderFailure {
                        provider: provider.name().to_owned(),
                        error,
                    });
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::error!("all clipboard copy methods failed");

        Err(ClipboardError::AllFailed { failures })
    }
}

/// Pipes the text into an external clipboard tool's stdin.
#[derive(Clone, Debug)]
pub struct CommandClipboard {
    program: String,
    args: Vec<String>,
}

impl CommandClipboard {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// A tool that takes no arguments.
    pub fn program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    async fn run(&self, text: &str) -> Result<(), ProviderError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => {
                    ProviderError::Unavailable(format!("`{}` not found", self.program))
                }
                _ => ProviderError::Failed(format!("could not start `{}`: {err}", self.program)),
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProviderError::Failed("stdin was not captured".to_owned()))?;
        stdin
            .write_all(text.as_bytes())
            .await
            .map_err(|err| ProviderError::Failed(format!("write to `{}`: {err}", self.program)))?;
        drop(stdin);

        let status = child
            .wait()
            .await
            .map_err(|err| ProviderError::Failed(format!("wait for `{}`: {err}", self.program)))?;
        if status.success() {
            Ok(())
        } else {
            Err(ProviderError::Failed(format!(
                "`{}` exited with {status}",
                self.program
            )))
        }
    }
}

impl ClipboardProvider for CommandClipboard {
    fn name(&self) -> &str {
        &self.program
    }

    fn write_text<'a>(&'a self, text: &'a str) -> ProviderFuture<'a> {
        Box::pin(self.run(text))
    }
}

/// In-process clipboard; useful as a last resort or in tests.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Option<String> {
        self.contents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ClipboardProvider for MemoryClipboard {
    fn name(&self) -> &str {
        "memory"
    }

    fn write_text<'a>(&'a self, text: &'a str) -> ProviderFuture<'a> {
        Box::pin(async move {
            *self.contents.lock().unwrap_or_else(PoisonError::into_inner) = Some(text.to_owned());
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{
        ClipboardChain, ClipboardError, ClipboardProvider, CommandClipboard, MemoryClipboard,
        ProviderError, ProviderFuture,
    };

    struct Broken(&'static str);

    impl ClipboardProvider for Broken {
        fn name(&self) -> &str {
            self.0
        }

        fn write_text<'a>(&'a self, _text: &'a str) -> ProviderFuture<'a> {
            Box::pin(async { Err(ProviderError::Failed("permission denied".to_owned())) })
        }
    }

    struct Shared(Arc<MemoryClipboard>);

    impl ClipboardProvider for Shared {
        fn name(&self) -> &str {
            self.0.name()
        }

        fn write_text<'a>(&'a self, text: &'a str) -> ProviderFuture<'a> {
            self.0.write_text(text)
        }
    }

    #[test]
    fn system_chain_lists_platform_tools_in_preference_order() {
        let chain = ClipboardChain::system();
        let names: Vec<&str> = chain.providers.iter().map(|p| p.name()).collect();

        let expected: &[&str] = if cfg!(target_os = "macos") {
            &["pbcopy"]
        } else if cfg!(windows) {
            &["powershell", "clip"]
        } else {
            &["wl-copy", "xclip"]
        };
        assert_eq!(names, expected);
        assert_eq!(chain.len(), expected.len());
        if !cfg!(target_os = "macos") {
            assert!(chain.len() >= 2, "{chain:?}");
        }
    }

    #[tokio::test]
    async fn first_working_provider_wins() {
        let memory = Arc::new(MemoryClipboard::new());
        let chain = ClipboardChain::new()
            .with_provider(Shared(Arc::clone(&memory)))
            .with_provider(Broken("never-reached"));

        let receipt = chain.copy("hello").await.expect("memory copy must succeed");
        assert_eq!(receipt.provider, "memory");
        assert!(!receipt.fallback_used);
        assert_eq!(memory.contents().as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn falls_back_past_failing_and_missing_providers() {
        let memory = Arc::new(MemoryClipboard::new());
        let chain = ClipboardChain::new()
            .with_provider(CommandClipboard::program(
                "definitely-not-a-clipboard-tool-7f3a",
            ))
            .with_provider(Broken("modern"))
            .with_provider(Shared(Arc::clone(&memory)));

        let receipt = chain.copy("fallback").await.expect("memory copy must succeed");
        assert_eq!(receipt.provider, "memory");
        assert!(receipt.fallback_used);
        assert_eq!(memory.contents().as_deref(), Some("fallback"));
    }

    #[tokio::test]
    async fn reports_every_failure_when_all_fail() {
        let chain = ClipboardChain::new()
            .with_provider(CommandClipboard::program(
                "definitely-not-a-clipboard-tool-7f3a",
            ))
            .with_provider(Broken("legacy"));

        match chain.copy("nope").await {
            Err(ClipboardError::AllFailed { failures }) => {
                assert_eq!(failures.len(), 2);
                assert!(matches!(failures[0].error, ProviderError::Unavailable(_)));
                assert_eq!(failures[1].provider, "legacy");
            }
            other => panic!("expected AllFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_chain_is_an_error() {
        let err = ClipboardChain::new()
            .copy("x")
            .await
            .expect_err("no providers");
        assert!(matches!(err, ClipboardError::NoProviders));
    }
}
