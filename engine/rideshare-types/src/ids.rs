//! Numeric identifiers for the aggregates owned by each service

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

id_type!(
    /// Driver aggregate owned by the route state machine
    DriverId
);
id_type!(
    /// Platform user; riders are addressed by their user id
    UserId
);
id_type!(
    /// Pickup station
    StationId
);
id_type!(
    /// Rider demand record ("ride request")
    RideRequestId
);
id_type!(
    /// Match record
    MatchId
);
id_type!(
    /// Trip aggregate
    TripId
);
