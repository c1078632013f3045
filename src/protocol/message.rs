use std::{fmt, str::FromStr};

pub const DELIMITER: char = '|';

// server -> client and client -> server use disjoint ranges
pub mod message_id {
    pub const SERVER_DISCONNECT: i64 = 1;
    pub const SERVER_MSG_INVALID: i64 = 2;
    pub const SERVER_TICKET_RANGE: i64 = 3;
    pub const SERVER_TICKET_INVALID: i64 = 4;
    pub const SERVER_TICKET_AVAILABLE: i64 = 5;
    pub const SERVER_TICKET_NOT_AVAILABLE: i64 = 6;
    pub const SERVER_TICKET_TX_FAILED: i64 = 7;
    pub const SERVER_TICKET_TX_SUCCESS: i64 = 8;

    pub const CLIENT_DISCONNECT: i64 = 10;
    pub const CLIENT_REQUEST_AVAILABILITY: i64 = 11;
    pub const CLIENT_REQUEST_STATUS: i64 = 12;
    pub const CLIENT_REQUEST_PURCHASE: i64 = 13;
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("message is missing its identifier")]
    MissingIdentifier,

    #[error("message identifier is not a number: {0:?}")]
    NonNumericIdentifier(String),

    #[error("unknown message identifier: {0}")]
    UnknownIdentifier(i64),

    #[error("missing {0} argument")]
    MissingArgument(&'static str),

    #[error("invalid {name} argument: {value:?}")]
    InvalidArgument { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seat {
    pub row: i64,
    pub col: i64,
}

impl Seat {
    pub fn new(row: i64, col: i64) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(row: {}, col: {})", self.row, self.col)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Disconnect,
    Availability,
    Status(Seat),
    Purchase(Seat),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Disconnect { reason: String },
    MsgInvalid { reason: String },
    TicketRange { rows: usize, cols: usize, available: usize },
    TicketInvalid { reason: String },
    TicketAvailable,
    TicketNotAvailable,
    TxFailed { reason: String },
    TxSuccess { reason: String },
}

impl Response {
    pub fn disconnect(reason: impl Into<String>) -> Self {
        Self::Disconnect {
            reason: reason.into(),
        }
    }

    pub fn msg_invalid(reason: impl Into<String>) -> Self {
        Self::MsgInvalid {
            reason: reason.into(),
        }
    }

    pub fn ticket_invalid(reason: impl Into<String>) -> Self {
        Self::TicketInvalid {
            reason: reason.into(),
        }
    }

    pub fn tx_failed(reason: impl Into<String>) -> Self {
        Self::TxFailed {
            reason: reason.into(),
        }
    }

    pub fn tx_success(reason: impl Into<String>) -> Self {
        Self::TxSuccess {
            reason: reason.into(),
        }
    }

    pub fn id(&self) -> i64 {
        use message_id::*;
        match self {
            Self::Disconnect { .. } => SERVER_DISCONNECT,
            Self::MsgInvalid { .. } => SERVER_MSG_INVALID,
            Self::TicketRange { .. } => SERVER_TICKET_RANGE,
            Self::TicketInvalid { .. } => SERVER_TICKET_INVALID,
            Self::TicketAvailable => SERVER_TICKET_AVAILABLE,
            Self::TicketNotAvailable => SERVER_TICKET_NOT_AVAILABLE,
            Self::TxFailed { .. } => SERVER_TICKET_TX_FAILED,
            Self::TxSuccess { .. } => SERVER_TICKET_TX_SUCCESS,
        }
    }
}

impl Request {
    pub fn id(&self) -> i64 {
        use message_id::*;
        match self {
            Self::Disconnect => CLIENT_DISCONNECT,
            Self::Availability => CLIENT_REQUEST_AVAILABILITY,
            Self::Status(_) => CLIENT_REQUEST_STATUS,
            Self::Purchase(_) => CLIENT_REQUEST_PURCHASE,
        }
    }
}

// Splits a raw line into its identifier and the remaining arguments.
// the arguments are consumed lazily, extra arguments are never looked at.
fn split(line: &str) -> Result<(i64, Fields<'_>), DecodeError> {
    let mut fields = line.trim_end_matches(&['\r', '\n'][..]).split(DELIMITER);

    let id = fields
        .next()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(DecodeError::MissingIdentifier)?;
    let id = id
        .parse::<i64>()
        .map_err(|_| DecodeError::NonNumericIdentifier(id.to_owned()))?;

    Ok((id, Fields(fields)))
}

struct Fields<'a>(std::str::Split<'a, char>);

impl<'a> Fields<'a> {
    fn next_str(&mut self, name: &'static str) -> Result<&'a str, DecodeError> {
        self.0
            .next()
            .map(str::trim)
            .filter(|field| !field.is_empty())
            .ok_or(DecodeError::MissingArgument(name))
    }

    fn next_num<T: FromStr>(&mut self, name: &'static str) -> Result<T, DecodeError> {
        let field = self.next_str(name)?;
        field.parse().map_err(|_| DecodeError::InvalidArgument {
            name,
            value: field.to_owned(),
        })
    }

    // reasons are optional on the wire
    fn reason(&mut self) -> String {
        self.0.next().unwrap_or_default().to_owned()
    }
}

impl FromStr for Request {
    type Err = DecodeError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        use message_id::*;

        let (id, mut fields) = split(line)?;
        let request = match id {
            CLIENT_DISCONNECT => Self::Disconnect,
            CLIENT_REQUEST_AVAILABILITY => Self::Availability,
            CLIENT_REQUEST_STATUS | CLIENT_REQUEST_PURCHASE => {
                // both arguments must be present before either is validated
                let row = fields.next_str("row")?;
                let col = fields.next_str("column")?;
                let seat = Seat::new(
                    parse_coordinate("row", row)?,
                    parse_coordinate("column", col)?,
                );

                if id == CLIENT_REQUEST_STATUS {
                    Self::Status(seat)
                } else {
                    Self::Purchase(seat)
                }
            }
            _ => return Err(DecodeError::UnknownIdentifier(id)),
        };

        Ok(request)
    }
}

fn parse_coordinate(name: &'static str, value: &str) -> Result<i64, DecodeError> {
    value.parse().map_err(|_| DecodeError::InvalidArgument {
        name,
        value: value.to_owned(),
    })
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())?;
        match self {
            Self::Disconnect | Self::Availability => Ok(()),
            Self::Status(seat) | Self::Purchase(seat) => {
                write!(f, "{DELIMITER}{}{DELIMITER}{}", seat.row, seat.col)
            }
        }
    }
}

impl FromStr for Response {
    type Err = DecodeError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        use message_id::*;

        let (id, mut fields) = split(line)?;
        let response = match id {
            SERVER_DISCONNECT => Self::Disconnect {
                reason: fields.reason(),
            },
            SERVER_MSG_INVALID => Self::MsgInvalid {
                reason: fields.reason(),
            },
            SERVER_TICKET_RANGE => Self::TicketRange {
                rows: fields.next_num("rows")?,
                cols: fields.next_num("columns")?,
                available: fields.next_num("available")?,
            },
            SERVER_TICKET_INVALID => Self::TicketInvalid {
                reason: fields.reason(),
            },
            SERVER_TICKET_AVAILABLE => Self::TicketAvailable,
            SERVER_TICKET_NOT_AVAILABLE => Self::TicketNotAvailable,
            SERVER_TICKET_TX_FAILED => Self::TxFailed {
                reason: fields.reason(),
            },
            SERVER_TICKET_TX_SUCCESS => Self::TxSuccess {
                reason: fields.reason(),
            },
            _ => return Err(DecodeError::UnknownIdentifier(id)),
        };

        Ok(response)
    }
}

// values are not escaped, a delimiter inside a reason breaks the framing
impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())?;
        match self {
            Self::Disconnect { reason }
            | Self::MsgInvalid { reason }
            | Self::TicketInvalid { reason }
            | Self::TxFailed { reason }
            | Self::TxSuccess { reason } => write!(f, "{DELIMITER}{reason}"),
            Self::TicketRange {
                rows,
                cols,
                available,
            } => write!(f, "{DELIMITER}{rows}{DELIMITER}{cols}{DELIMITER}{available}"),
            Self::TicketAvailable | Self::TicketNotAvailable => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DecodeError, Request, Response, Seat};

    #[test]
    fn check_request_parsing() {
        let raw_requests = ["10", "11\n", "12|3|4", "13|0|0\r\n", " 13 | -1 | 7 ", "12|1|2|99"];

        let expected_requests = [
            Request::Disconnect,
            Request::Availability,
            Request::Status(Seat::new(3, 4)),
            Request::Purchase(Seat::new(0, 0)),
            Request::Purchase(Seat::new(-1, 7)),
            Request::Status(Seat::new(1, 2)),
        ];

        for (raw, expected) in raw_requests.into_iter().zip(expected_requests) {
            assert_eq!(raw.parse::<Request>().unwrap(), expected);
        }
    }

    #[test]
    fn check_bad_request_parsing() {
        let bad_requests = ["", "\n", "|12|1", "abc", "999", "1", "12", "13|4", "12|x|1", "13|1|"];

        let expected_errors = [
            DecodeError::MissingIdentifier,
            DecodeError::MissingIdentifier,
            DecodeError::MissingIdentifier,
            DecodeError::NonNumericIdentifier("abc".into()),
            DecodeError::UnknownIdentifier(999),
            DecodeError::UnknownIdentifier(1),
            DecodeError::MissingArgument("row"),
            DecodeError::MissingArgument("column"),
            DecodeError::InvalidArgument {
                name: "row",
                value: "x".into(),
            },
            DecodeError::MissingArgument("column"),
        ];

        for (raw, expected) in bad_requests.into_iter().zip(expected_errors) {
            assert_eq!(raw.parse::<Request>().unwrap_err(), expected, "{:?}", raw);
        }
    }

    #[test]
    fn check_response_encoding() {
        let responses = [
            Response::disconnect("Server full"),
            Response::msg_invalid("Unknown request id"),
            Response::TicketRange {
                rows: 5,
                cols: 5,
                available: 25,
            },
            Response::ticket_invalid("Invalid row or column"),
            Response::TicketAvailable,
            Response::TicketNotAvailable,
            Response::tx_failed("Ticket already purchased"),
            Response::tx_success("Ticket purchased"),
        ];

        let expected = [
            "1|Server full",
            "2|Unknown request id",
            "3|5|5|25",
            "4|Invalid row or column",
            "5",
            "6",
            "7|Ticket already purchased",
            "8|Ticket purchased",
        ];

        for (response, expected) in responses.iter().zip(expected) {
            assert_eq!(response.to_string(), expected);
            assert_eq!(&expected.parse::<Response>().unwrap(), response);
        }
    }

    #[test]
    fn check_response_parsing_edge_cases() {
        // the reason is optional
        assert_eq!(
            "1".parse::<Response>().unwrap(),
            Response::disconnect(String::new())
        );
        assert_eq!(
            "3|5|5".parse::<Response>().unwrap_err(),
            DecodeError::MissingArgument("available")
        );
        assert_eq!(
            "13|1|1".parse::<Response>().unwrap_err(),
            DecodeError::UnknownIdentifier(13)
        );
    }

    #[test]
    fn check_request_encoding() {
        assert_eq!(Request::Disconnect.to_string(), "10");
        assert_eq!(Request::Availability.to_string(), "11");
        assert_eq!(Request::Status(Seat::new(2, 3)).to_string(), "12|2|3");
        assert_eq!(Request::Purchase(Seat::new(-1, 0)).to_string(), "13|-1|0");
    }
}
