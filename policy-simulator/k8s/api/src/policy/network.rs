use std::net::IpAddr;

/// An `ipBlock` peer: a network, less any excepted subnetworks.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct IpBlock {
    pub cidr: Cidr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub except: Option<Vec<Cidr>>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum Cidr {
    Addr(IpAddr),
    Net(ipnet::IpNet),
}

#[derive(Debug, thiserror::Error)]
#[error("not a valid CIDR or IP address: {0}")]
pub struct CidrParseError(String);

// === impl IpBlock ===

impl IpBlock {
    pub fn contains(&self, addr: &IpAddr) -> bool {
        let addr = Cidr::Addr(*addr);
        self.cidr.contains(&addr)
            && !self
                .except
                .iter()
                .flatten()
                .any(|except| except.contains(&addr))
    }
}

impl From<Cidr> for IpBlock {
    fn from(cidr: Cidr) -> Self {
        Self { cidr, except: None }
    }
}

// === impl Cidr ===

impl Cidr {
    #[inline]
    pub fn contains(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Net(this), Self::Net(other)) => this.contains(other),
            (Self::Net(this), Self::Addr(other)) => this.contains(other),
            (Self::Addr(this), Self::Net(other)) => ipnet::IpNet::from(*this).contains(other),
            (Self::Addr(this), Self::Addr(other)) => this == other,
        }
    }
}

impl std::str::FromStr for Cidr {
    type Err = CidrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(net) = s.parse() {
            return Ok(Self::Net(net));
        }

        if let Ok(addr) = s.parse() {
            return Ok(Self::Addr(addr));
        }

        Err(CidrParseError(s.to_string()))
    }
}

impl std::fmt::Display for Cidr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Addr(addr) => addr.fmt(f),
            Self::Net(net) => net.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_block_honors_exceptions() {
        let block = IpBlock {
            cidr: "10.0.0.0/16".parse().unwrap(),
            except: Some(vec!["10.0.1.0/24".parse().unwrap()]),
        };
        assert!(block.contains(&"10.0.0.7".parse().unwrap()));
        assert!(!block.contains(&"10.0.1.7".parse().unwrap()));
        assert!(!block.contains(&"192.168.0.1".parse().unwrap()));
    }

    #[test]
    fn single_address_block() {
        let block = IpBlock::from("192.0.2.10".parse::<Cidr>().unwrap());
        assert!(block.contains(&"192.0.2.10".parse().unwrap()));
        assert!(!block.contains(&"192.0.2.11".parse().unwrap()));
    }
}
