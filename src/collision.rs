//! At most one active banner may claim a (tag, feature) pair.
//!
//! Stores look up the active claims on the requested pairs within the same transaction that performs the write and
//! pass them to [`ensure_unclaimed`]. Only writes leaving the banner active are checked; inactive banners never
//! collide.

use tracing::debug;

use crate::error::BannerError;
use crate::error::Result;
use crate::types::BannerId;
use crate::types::Claim;

/// Accepts the claims that belong to the requesting banner itself and rejects everything else. `requester` is `None`
/// for banners that don't exist yet.
pub fn ensure_unclaimed(requester: Option<BannerId>, claims: &[Claim]) -> Result<()> {
    match claims.iter().find(|c| Some(c.banner_id) != requester) {
        None => Ok(()),
        Some(claim) => {
            debug!(
                "tag {} and feature {} are held by banner {} (version {})",
                claim.tag_id, claim.feature_id, claim.banner_id, claim.version
            );
            Err(BannerError::Conflict(format!(
                "tag {} and feature {} are already claimed by active banner {}",
                claim.tag_id, claim.feature_id, claim.banner_id
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn claim(banner_id: BannerId) -> Claim {
        Claim {
            banner_id,
            version: 1,
            tag_id: 10,
            feature_id: 3,
        }
    }

    #[test]
    fn test_no_claims() {
        assert!(ensure_unclaimed(None, &[]).is_ok());
    }

    #[test]
    fn test_own_claim_is_fine() {
        assert!(ensure_unclaimed(Some(1), &[claim(1)]).is_ok());
    }

    #[test]
    fn test_foreign_claim_conflicts() {
        let err = ensure_unclaimed(Some(1), &[claim(1), claim(2)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().contains("tag 10 and feature 3"));

        let err = ensure_unclaimed(None, &[claim(1)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}
