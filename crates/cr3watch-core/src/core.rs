use serde::{Deserialize, Serialize};

macro_rules! impl_id {
    ($name:ident, $type:ty, $doc:expr) => {
        #[doc = concat!($doc, ".")]
        #[derive(
            Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub $type);

        impl $name {
            #[doc = concat!("Creates a new instance of the `", stringify!($name), "` type.")]
            pub const fn new(value: $type) -> Self {
                Self(value)
            }
        }

        impl From<$type> for $name {
            fn from(value: $type) -> Self {
                Self(value)
            }
        }

        impl From<$name> for $type {
            fn from(value: $name) -> $type {
                value.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

impl_id!(
    DomainId,
    u32,
    "A hypervisor-assigned domain identifier, reused after the domain is destroyed"
);
impl_id!(VcpuId, u16, "A virtual CPU index within a domain");
impl_id!(EventChannelPort, u32, "An event channel port number");

impl DomainId {
    /// IDs from here on name special domains (`DOMID_SELF`, `DOMID_IO`,
    /// ...) rather than guests.
    pub const FIRST_RESERVED: Self = Self(0x7ff0);

    /// Returns `true` if the ID names a special domain.
    pub const fn is_reserved(self) -> bool {
        self.0 >= Self::FIRST_RESERVED.0
    }
}
