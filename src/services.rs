//! Service names used to label open ports.
//!
//! Labels are purely cosmetic; a port without a mapping is reported without one.
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use csv::{ReaderBuilder, Trim};
use log::debug;
use once_cell::sync::Lazy;

/// Resolves a TCP port to a well-known service name.
pub trait ServiceLookup {
    /// The service usually found on `port`, if one is known.
    fn service_name(&self, port: u16) -> Option<&str>;
}

static WELL_KNOWN: Lazy<HashMap<u16, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (7, "echo"),
        (20, "ftp-data"),
        (21, "ftp"),
        (22, "ssh"),
        (23, "telnet"),
        (25, "smtp"),
        (53, "domain"),
        (80, "http"),
        (88, "kerberos"),
        (110, "pop3"),
        (111, "sunrpc"),
        (119, "nntp"),
        (123, "ntp"),
        (135, "epmap"),
        (139, "netbios-ssn"),
        (143, "imap"),
        (161, "snmp"),
        (179, "bgp"),
        (389, "ldap"),
        (443, "https"),
        (445, "microsoft-ds"),
        (465, "submissions"),
        (514, "shell"),
        (515, "printer"),
        (587, "submission"),
        (631, "ipp"),
        (636, "ldaps"),
        (873, "rsync"),
        (993, "imaps"),
        (995, "pop3s"),
        (1080, "socks"),
        (1433, "ms-sql-s"),
        (1521, "ncube-lm"),
        (1723, "pptp"),
        (1883, "mqtt"),
        (2049, "nfs"),
        (2375, "docker"),
        (3306, "mysql"),
        (3389, "ms-wbt-server"),
        (5060, "sip"),
        (5432, "postgresql"),
        (5672, "amqp"),
        (5900, "rfb"),
        (6379, "redis"),
        (8080, "http-alt"),
        (8443, "pcsync-https"),
        (9200, "wap-wsp"),
        (11211, "memcache"),
        (27017, "mongodb"),
    ])
});

/// A port to service-name table.
#[derive(Debug, Clone, Default)]
pub struct ServiceTable {
    names: HashMap<u16, String>,
}

impl ServiceTable {
    /// Table holding the built-in well-known TCP services.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            names: WELL_KNOWN
                .iter()
                .map(|(&port, &name)| (port, name.to_owned()))
                .collect(),
        }
    }

    /// Table without any mapping.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads a table from a CSV file, see [`Self::from_csv`].
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read service table: {}", path.display()))?;
        Self::from_csv(&content)
            .with_context(|| format!("failed to parse service table: {}", path.display()))
    }

    /// Parses a CSV service registry. Quoted fields may hold commas and line breaks.
    ///
    /// The header must name a port column (`Port` or `Port Number`) and a
    /// service column (`Service` or `Service Name`). When a `Transport Protocol`
    /// column exists only `tcp` rows are kept. Rows with an empty service, a
    /// port range such as `6000-6063` or an unparsable port are skipped. The
    /// first mapping for a port wins.
    pub fn from_csv(content: &str) -> anyhow::Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(content.as_bytes());

        let header = reader
            .headers()
            .context("failed to read service table header")?
            .clone();
        if header.iter().all(str::is_empty) {
            bail!("service table is empty");
        }
        let column = |names: &[&str]| {
            header
                .iter()
                .position(|field| names.iter().any(|n| field.eq_ignore_ascii_case(n)))
        };
        let Some(port_column) = column(&["Port", "Port Number"]) else {
            bail!("service table has no port column");
        };
        let Some(service_column) = column(&["Service", "Service Name"]) else {
            bail!("service table has no service column");
        };
        let protocol_column = column(&["Transport Protocol", "Protocol"]);

        let mut names = HashMap::new();
        let mut skipped = 0usize;
        for record in reader.records() {
            let record = record.context("malformed service table row")?;
            let field = |index: usize| record.get(index).unwrap_or("");

            if let Some(index) = protocol_column {
                let protocol = field(index);
                if !protocol.is_empty() && !protocol.eq_ignore_ascii_case("tcp") {
                    continue;
                }
            }

            let service = field(service_column);
            match field(port_column).parse::<u16>() {
                Ok(port) if port != 0 && !service.is_empty() => {
                    names.entry(port).or_insert_with(|| service.to_owned());
                }
                _ => skipped += 1,
            }
        }
        debug!(
            "Loaded {} service names, skipped {} rows",
            names.len(),
            skipped
        );

        Ok(Self { names })
    }

    /// Number of mapped ports.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True when no port is mapped.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl ServiceLookup for ServiceTable {
    fn service_name(&self, port: u16) -> Option<&str> {
        self.names.get(&port).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::{ServiceLookup, ServiceTable};

    #[test]
    fn builtin_knows_common_ports() {
        let table = ServiceTable::builtin();
        assert_eq!(table.service_name(22), Some("ssh"));
        assert_eq!(table.service_name(443), Some("https"));
        assert_eq!(table.service_name(1), None);
    }

    #[test]
    fn empty_table_has_no_labels() {
        let table = ServiceTable::empty();
        assert!(table.is_empty());
        assert_eq!(table.service_name(80), None);
    }

    #[test]
    fn quoted_fields_may_span_lines() {
        let csv = "\
Service Name,Port Number,Transport Protocol,Description
telnet,23,tcp,\"Telnet
see notes, 8080, tcp\"
https,443,tcp,HTTPS
";
        let table = ServiceTable::from_csv(csv).unwrap();

        assert_eq!(table.service_name(23), Some("telnet"));
        assert_eq!(table.service_name(443), Some("https"));
        assert_eq!(table.service_name(8080), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn quoted_fields_may_hold_commas() {
        let table =
            ServiceTable::from_csv("Port,Service,Description\n80,http,\"web, \"\"www\"\"\"\n")
                .unwrap();
        assert_eq!(table.service_name(80), Some("http"));
    }

    #[test]
    fn parses_short_headers() {
        let table = ServiceTable::from_csv("Port,Service\n80,http\n443,https\n").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.service_name(80), Some("http"));
    }

    #[test]
    fn parses_iana_registry_layout() {
        let csv = "\
Service Name,Port Number,Transport Protocol,Description,Assignee
http,80,tcp,\"World Wide Web HTTP, www\",[Tim_Berners_Lee]
http,80,udp,World Wide Web HTTP,[Tim_Berners_Lee]
ntp,123,udp,Network Time Protocol,[Dave_Mills]
x11,6000-6063,tcp,X Window System,[Stephen_Gildea]
,81,tcp,Unassigned,
https,443,tcp,http protocol over TLS/SSL,[Kipp_Hickman]
";
        let table = ServiceTable::from_csv(csv).unwrap();

        assert_eq!(table.service_name(80), Some("http"));
        assert_eq!(table.service_name(443), Some("https"));
        assert_eq!(table.service_name(123), None);
        assert_eq!(table.service_name(81), None);
        assert_eq!(table.service_name(6000), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn first_mapping_wins() {
        let table = ServiceTable::from_csv("Port,Service\n80,http\n80,www\n").unwrap();
        assert_eq!(table.service_name(80), Some("http"));
    }

    #[test]
    fn rejects_missing_columns() {
        assert!(ServiceTable::from_csv("").is_err());
        assert!(ServiceTable::from_csv("Name,Number\nhttp,80\n").is_err());
        assert!(ServiceTable::from_csv("Port,Description\n80,web\n").is_err());
    }
}
