//! Data-center address table.

use std::fmt;

const TEST: &[(i32, &str)] = &[
    (1, "149.154.175.10"),
    (2, "149.154.167.40"),
    (3, "149.154.175.117"),
];

const PROD: &[(i32, &str)] = &[
    (1, "149.154.175.53"),
    (2, "149.154.167.51"),
    (3, "149.154.175.100"),
    (4, "149.154.167.91"),
    (5, "91.108.56.130"),
    (203, "91.105.192.100"),
];

const PROD_MEDIA: &[(i32, &str)] = &[
    (2, "149.154.167.151"),
    (4, "149.154.164.250"),
];

const TEST_IPV6: &[(i32, &str)] = &[
    (1, "2001:b28:f23d:f001::e"),
    (2, "2001:67c:4e8:f002::e"),
    (3, "2001:b28:f23d:f003::e"),
];

const PROD_IPV6: &[(i32, &str)] = &[
    (1, "2001:b28:f23d:f001::a"),
    (2, "2001:67c:4e8:f002::a"),
    (3, "2001:b28:f23d:f003::a"),
    (4, "2001:67c:4e8:f004::a"),
    (5, "2001:b28:f23f:f005::a"),
    (203, "2a0a:f280:203:a:5000::100"),
];

const PROD_IPV6_MEDIA: &[(i32, &str)] = &[
    (2, "2001:67c:4e8:f002::b"),
    (4, "2001:67c:4e8:f004::b"),
];

fn lookup(table: &[(i32, &'static str)], dc_id: i32) -> Option<&'static str> {
    table.iter().find(|(id, _)| *id == dc_id).map(|(_, ip)| *ip)
}

/// Where to reach one DC.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DcAddress {
    pub dc_id: i32,
    pub ip:    String,
    pub port:  u16,
}

impl DcAddress {
    /// Resolve `dc_id` from the built-in table. Test DCs listen on port 80,
    /// production ones on 443. Media addresses fall back to the regular ones
    /// for DCs without a dedicated media endpoint.
    pub fn lookup(dc_id: i32, test_mode: bool, ipv6: bool, media: bool) -> Option<Self> {
        let (ip, port) = match (test_mode, ipv6) {
            (true, false) => (lookup(TEST, dc_id)?, 80),
            (true, true) => (lookup(TEST_IPV6, dc_id)?, 80),
            (false, false) => {
                let media_ip = if media { lookup(PROD_MEDIA, dc_id) } else { None };
                (media_ip.or_else(|| lookup(PROD, dc_id))?, 443)
            }
            (false, true) => {
                let media_ip = if media { lookup(PROD_IPV6_MEDIA, dc_id) } else { None };
                (media_ip.or_else(|| lookup(PROD_IPV6, dc_id))?, 443)
            }
        };
        Some(Self { dc_id, ip: ip.to_string(), port })
    }

    /// `host:port`, with IPv6 hosts bracketed.
    pub fn socket_addr(&self) -> String {
        if self.ip.contains(':') {
            format!("[{}]:{}", self.ip, self.port)
        } else {
            format!("{}:{}", self.ip, self.port)
        }
    }
}

impl fmt::Display for DcAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DC{} ({})", self.dc_id, self.socket_addr())
    }
}
