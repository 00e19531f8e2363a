//! Checks applied before the assistant downloads a page itself, so a search
//! result cannot point the direct fetch at loopback or LAN hosts.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use tracing::warn;
use url::{Host, Url};

use super::FetchError;

const DNS_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Name resolution used by the host guard.
pub(super) trait Resolver {
    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<IpAddr>, FetchError>;
}

/// Resolves through the system resolver via tokio.
pub(super) struct SystemResolver;

impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<IpAddr>, FetchError> {
        let addrs = tokio::time::timeout(DNS_LOOKUP_TIMEOUT, tokio::net::lookup_host((host, port)))
            .await
            .map_err(|_| FetchError::DnsResolution("DNS lookup timed out".to_string()))?
            .map_err(|e| FetchError::DnsResolution(e.to_string()))?;
        Ok(addrs.map(|a| a.ip()).collect())
    }
}

/// Rejects internal hosts, including public-looking names that resolve to
/// private addresses.
pub(super) async fn ensure_public(raw: &str, resolver: &impl Resolver) -> Result<Url, FetchError> {
    let parsed = validate_url(raw)?;

    if let Some(Host::Domain(domain)) = parsed.host() {
        let port = parsed.port_or_known_default().unwrap_or(443);
        for ip in resolver.resolve(domain, port).await? {
            if is_private_ip(ip) {
                warn!(host = %domain, %ip, "host resolves to a private address");
                return Err(FetchError::InternalHost);
            }
        }
    }

    Ok(parsed)
}

pub(super) fn validate_url(raw: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(raw)?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(FetchError::InvalidScheme);
    }
    let blocked = match parsed.host() {
        Some(Host::Ipv4(v4)) => is_private_ip(IpAddr::V4(v4)),
        Some(Host::Ipv6(v6)) => is_private_ip(IpAddr::V6(v6)),
        Some(Host::Domain(domain)) => is_internal_name(domain),
        None => true,
    };
    if blocked {
        warn!(host = ?parsed.host_str(), "refusing direct fetch of internal host");
        return Err(FetchError::InternalHost);
    }
    Ok(parsed)
}

fn is_internal_name(domain: &str) -> bool {
    let lower = domain.to_ascii_lowercase();
    lower == "localhost"
        || [".localhost", ".local", ".internal", ".arpa"]
            .iter()
            .any(|suffix| lower.ends_with(suffix))
}

fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xffc0) == 0xfe80
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || v6.to_ipv4_mapped().is_some_and(is_private_v4)
        }
    }
}

fn is_private_v4(v4: Ipv4Addr) -> bool {
    let [a, b, ..] = v4.octets();
    v4.is_loopback()
        || v4.is_private()
        || v4.is_link_local()
        || v4.is_broadcast()
        || a == 0
        // carrier-grade NAT, 100.64.0.0/10
        || (a == 100 && (64..=127).contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_public_urls() {
        for url in [
            "https://example.com/docs",
            "http://8.8.8.8/dns",
            "http://[2001:db8::1]/page",
        ] {
            assert!(validate_url(url).is_ok(), "should accept: {url}");
        }
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(matches!(
            validate_url("ftp://example.com"),
            Err(FetchError::InvalidScheme)
        ));
        assert!(matches!(
            validate_url("file:///etc/passwd"),
            Err(FetchError::InvalidScheme)
        ));
        assert!(matches!(
            validate_url("not a url"),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn rejects_internal_hosts() {
        for url in [
            "http://localhost:11434/api/tags",
            "http://printer.local/",
            "http://metadata.google.internal/",
            "http://127.0.0.1/",
            "http://10.1.2.3/",
            "http://192.168.0.1/",
            "http://169.254.169.254/latest/meta-data",
            "http://100.100.1.1/",
            "http://0.0.0.0/",
            "http://[::1]/",
            "http://[fe80::1]/",
            "http://[fd12::1]/",
            "http://[::ffff:10.0.0.1]/",
        ] {
            assert!(
                matches!(validate_url(url), Err(FetchError::InternalHost)),
                "should block: {url}"
            );
        }
    }

    struct FixedResolver(Vec<IpAddr>);

    impl Resolver for FixedResolver {
        async fn resolve(&self, _host: &str, _port: u16) -> Result<Vec<IpAddr>, FetchError> {
            Ok(self.0.clone())
        }
    }

    /// Fails the test if a lookup happens at all.
    struct NoLookup;

    impl Resolver for NoLookup {
        async fn resolve(&self, host: &str, _port: u16) -> Result<Vec<IpAddr>, FetchError> {
            panic!("unexpected DNS lookup for {host}");
        }
    }

    struct FailingResolver;

    impl Resolver for FailingResolver {
        async fn resolve(&self, _host: &str, _port: u16) -> Result<Vec<IpAddr>, FetchError> {
            Err(FetchError::DnsResolution("NXDOMAIN".to_string()))
        }
    }

    #[tokio::test]
    async fn ip_literal_skips_dns() {
        assert!(ensure_public("https://8.8.8.8/page", &NoLookup).await.is_ok());
    }

    #[tokio::test]
    async fn localhost_blocked_before_dns() {
        assert!(matches!(
            ensure_public("http://localhost/secret", &NoLookup).await,
            Err(FetchError::InternalHost)
        ));
    }

    #[tokio::test]
    async fn domain_resolving_to_private_address_is_blocked() {
        for ip in ["10.0.0.1", "169.254.169.254"] {
            let resolver = FixedResolver(vec![ip.parse().unwrap()]);
            assert!(
                matches!(
                    ensure_public("https://docs.example.com/page", &resolver).await,
                    Err(FetchError::InternalHost)
                ),
                "should block a name resolving to {ip}"
            );
        }
    }

    #[tokio::test]
    async fn any_private_address_in_the_answer_blocks() {
        let resolver = FixedResolver(vec![
            "93.184.216.34".parse().unwrap(),
            "192.168.1.10".parse().unwrap(),
        ]);
        assert!(matches!(
            ensure_public("https://docs.example.com/", &resolver).await,
            Err(FetchError::InternalHost)
        ));
    }

    #[tokio::test]
    async fn domain_resolving_to_public_address_passes() {
        let resolver = FixedResolver(vec!["93.184.216.34".parse().unwrap()]);
        let url = ensure_public("https://docs.example.com/page", &resolver)
            .await
            .unwrap();
        assert_eq!(url.host_str(), Some("docs.example.com"));
    }

    #[tokio::test]
    async fn resolution_failure_is_reported() {
        assert!(matches!(
            ensure_public("https://docs.example.com/", &FailingResolver).await,
            Err(FetchError::DnsResolution(_))
        ));
    }
}
