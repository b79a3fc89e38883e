//! Data models for Maintrack

/// Store a string-backed enum in a TEXT column through its `as_str` / `FromStr` pair
macro_rules! text_enum_sqlx {
    ($ty:ty) => {
        impl sqlx::Type<sqlx::Postgres> for $ty {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $ty {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
                s.parse::<$ty>().map_err(|e| e.to_string().into())
            }
        }

        impl sqlx::Encode<'_, sqlx::Postgres> for $ty {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> sqlx::encode::IsNull {
                <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
            }
        }
    };
}

pub mod asset;
pub mod maintenance;
pub mod schedule;
pub mod store;
pub mod user;

// Re-export commonly used types
pub use asset::{Asset, AssetHistory, AssetListEntry, AssetStatus};
pub use maintenance::{Maintenance, MaintenanceDetails, MaintenanceItem, MaintenanceStatus};
pub use schedule::{Schedule, ScheduleStatus};
pub use store::Store;
pub use user::{Role, User, UserClaims};
