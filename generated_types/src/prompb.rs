//! The Prometheus remote read/write wire messages.
//!
//! These mirror the message definitions in `prometheus/prompb/{types,remote}.proto`
//! as the equivalent [`prost::Message`] derive structs. Only the subset a
//! remote storage adapter exchanges is defined; unknown fields (e.g. read
//! hints) are skipped by prost on decode.

/// A single observation: value at a millisecond timestamp.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Sample {
    #[prost(double, tag = "1")]
    pub value: f64,
    /// Milliseconds since epoch.
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
}

/// A `(name, value)` pair attached to a series.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Label {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub value: ::prost::alloc::string::String,
}

/// A labelled stream of samples.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TimeSeries {
    /// Labels uniquely identifying the series. By convention of the remote
    /// write protocol the `__name__` label comes first.
    #[prost(message, repeated, tag = "1")]
    pub labels: ::prost::alloc::vec::Vec<Label>,
    #[prost(message, repeated, tag = "2")]
    pub samples: ::prost::alloc::vec::Vec<Sample>,
}

/// Matcher for selecting series in a read query.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LabelMatcher {
    #[prost(enumeration = "label_matcher::Type", tag = "1")]
    pub r#type: i32,
    #[prost(string, tag = "2")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub value: ::prost::alloc::string::String,
}

/// Nested definitions for [`LabelMatcher`].
pub mod label_matcher {
    /// Matcher operator.
    #[derive(
        Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration,
    )]
    #[repr(i32)]
    pub enum Type {
        /// Exact equality.
        Eq = 0,
        /// Negated equality.
        Neq = 1,
        /// Regular expression match.
        Re = 2,
        /// Negated regular expression match.
        Nre = 3,
    }

    impl Type {
        /// String representation used by `EnumDescriptor`-style accessors.
        pub fn as_str_name(&self) -> &'static str {
            match self {
                Self::Eq => "EQ",
                Self::Neq => "NEQ",
                Self::Re => "RE",
                Self::Nre => "NRE",
            }
        }
    }
}

/// A point-range query over series selected by `matchers`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Query {
    #[prost(int64, tag = "1")]
    pub start_timestamp_ms: i64,
    #[prost(int64, tag = "2")]
    pub end_timestamp_ms: i64,
    #[prost(message, repeated, tag = "3")]
    pub matchers: ::prost::alloc::vec::Vec<LabelMatcher>,
}

/// Series matched by one [`Query`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryResult {
    #[prost(message, repeated, tag = "1")]
    pub timeseries: ::prost::alloc::vec::Vec<TimeSeries>,
}

/// Body of a remote write request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WriteRequest {
    #[prost(message, repeated, tag = "1")]
    pub timeseries: ::prost::alloc::vec::Vec<TimeSeries>,
}

/// Body of a remote read request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadRequest {
    #[prost(message, repeated, tag = "1")]
    pub queries: ::prost::alloc::vec::Vec<Query>,
}

/// Body of a remote read response, one result per query, in order.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadResponse {
    #[prost(message, repeated, tag = "1")]
    pub results: ::prost::alloc::vec::Vec<QueryResult>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_write_request_round_trip() {
        let req = WriteRequest {
            timeseries: vec![TimeSeries {
                labels: vec![
                    Label {
                        name: "__name__".into(),
                        value: "up".into(),
                    },
                    Label {
                        name: "job".into(),
                        value: "node".into(),
                    },
                ],
                samples: vec![Sample {
                    value: 1.0,
                    timestamp: 1_000,
                }],
            }],
        };

        let encoded = req.encode_to_vec();
        let decoded = WriteRequest::decode(encoded.as_slice()).unwrap();
        assert_eq!(req, decoded);
    }

    #[test]
    fn test_matcher_type_enumeration() {
        let m = LabelMatcher {
            r#type: label_matcher::Type::Eq as i32,
            name: "__name__".into(),
            value: "up".into(),
        };
        assert_eq!(m.r#type(), label_matcher::Type::Eq);
        assert_eq!(m.r#type().as_str_name(), "EQ");
    }
}
