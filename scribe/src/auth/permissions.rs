//! Resource authorization policy.
//!
//! Pure decision functions over the authenticated caller. They never touch
//! the store; handlers load the target resource first and pass it in.
//!
//! - Superusers may do anything.
//! - Creating needs the `add_*` capability for the resource kind.
//! - Updating or deleting needs the matching `change_*` / `delete_*`
//!   capability *and* authorship of the target. A target with no author is
//!   off-limits to everyone but superusers.

use tracing::debug;

use crate::{
    api::models::users::CurrentUser,
    config::PolicyConfig,
    db::models::{articles::ArticleDBResponse, comments::CommentDBResponse},
    errors::{Error, Result},
    types::{Capability, Operation, Resource, UserId, abbrev_uuid},
};

/// Anything with a (possibly cleared) author reference.
pub trait Authored {
    fn author_id(&self) -> Option<UserId>;
}

impl Authored for ArticleDBResponse {
    fn author_id(&self) -> Option<UserId> {
        self.author_id
    }
}

impl Authored for CommentDBResponse {
    fn author_id(&self) -> Option<UserId> {
        self.author_id
    }
}

/// Check that `user` may create a new `resource`.
pub fn can_create(user: &CurrentUser, resource: Resource) -> Result<()> {
    if user.is_superuser || user.has_capability(Capability::required_for(resource, Operation::Create)) {
        return Ok(());
    }

    debug!(user_id = %abbrev_uuid(&user.id), %resource, "create denied");
    Err(Error::PermissionDenied {
        action: Operation::Create,
        resource,
    })
}

/// Check that `user` may apply `operation` to `target`.
pub fn can_mutate<T: Authored>(user: &CurrentUser, operation: Operation, resource: Resource, target: &T) -> Result<()> {
    if user.is_superuser {
        return Ok(());
    }

    let is_author = target.author_id() == Some(user.id);
    let has_capability = user.has_capability(Capability::required_for(resource, operation));
    if is_author && has_capability {
        return Ok(());
    }

    debug!(
        user_id = %abbrev_uuid(&user.id),
        %operation,
        %resource,
        is_author,
        has_capability,
        "mutation denied"
    );
    Err(Error::PermissionDenied {
        action: operation,
        resource,
    })
}

/// Delete check. Same as [`can_mutate`] unless `unrestricted_delete` is set,
/// in which case any authenticated caller may delete.
pub fn can_delete<T: Authored>(user: &CurrentUser, resource: Resource, target: &T, policy: &PolicyConfig) -> Result<()> {
    if policy.unrestricted_delete {
        return Ok(());
    }
    can_mutate(user, Operation::Delete, resource, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    struct Target(Option<UserId>);

    impl Authored for Target {
        fn author_id(&self) -> Option<UserId> {
            self.0
        }
    }

    fn user(permissions: &[Capability], is_superuser: bool) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            username: "writer".to_string(),
            email: "writer@example.com".to_string(),
            is_superuser,
            permissions: permissions.iter().copied().collect::<BTreeSet<_>>(),
        }
    }

    #[test]
    fn test_superuser_can_do_anything() {
        let admin = user(&[], true);
        let someone_elses = Target(Some(Uuid::new_v4()));

        assert!(can_create(&admin, Resource::Articles).is_ok());
        assert!(can_mutate(&admin, Operation::Update, Resource::Articles, &someone_elses).is_ok());
        assert!(can_mutate(&admin, Operation::Update, Resource::Articles, &Target(None)).is_ok());
        assert!(can_delete(&admin, Resource::Articles, &someone_elses, &PolicyConfig::default()).is_ok());
    }

    #[test]
    fn test_author_with_capability_can_update() {
        let writer = user(&[Capability::ChangeArticle], false);
        let own = Target(Some(writer.id));

        assert!(can_mutate(&writer, Operation::Update, Resource::Articles, &own).is_ok());
    }

    #[test]
    fn test_author_without_capability_is_denied() {
        // add_article does not grant edits
        let writer = user(&[Capability::AddArticle], false);
        let own = Target(Some(writer.id));

        let result = can_mutate(&writer, Operation::Update, Resource::Articles, &own);
        assert!(matches!(
            result,
            Err(Error::PermissionDenied {
                action: Operation::Update,
                resource: Resource::Articles
            })
        ));
    }

    #[test]
    fn test_non_author_with_capability_is_denied() {
        let writer = user(&[Capability::ChangeArticle, Capability::DeleteArticle], false);
        let other = Target(Some(Uuid::new_v4()));

        assert!(can_mutate(&writer, Operation::Update, Resource::Articles, &other).is_err());
        assert!(can_delete(&writer, Resource::Articles, &other, &PolicyConfig::default()).is_err());
    }

    #[test]
    fn test_missing_author_denies_non_superusers() {
        let writer = user(&Capability::ALL, false);
        assert!(can_mutate(&writer, Operation::Update, Resource::Articles, &Target(None)).is_err());
        assert!(can_mutate(&writer, Operation::Delete, Resource::Comments, &Target(None)).is_err());
    }

    #[test]
    fn test_capability_is_per_resource_kind() {
        let writer = user(&[Capability::ChangeComment], false);
        let own = Target(Some(writer.id));

        assert!(can_mutate(&writer, Operation::Update, Resource::Comments, &own).is_ok());
        assert!(can_mutate(&writer, Operation::Update, Resource::Articles, &own).is_err());
    }

    #[test]
    fn test_create_needs_add_capability() {
        assert!(can_create(&user(&[Capability::AddArticle], false), Resource::Articles).is_ok());
        assert!(can_create(&user(&[Capability::AddArticle], false), Resource::Comments).is_err());
        assert!(can_create(&user(&[Capability::ChangeArticle], false), Resource::Articles).is_err());
    }

    #[test]
    fn test_delete_uses_delete_capability() {
        let writer = user(&[Capability::DeleteArticle], false);
        let own = Target(Some(writer.id));
        assert!(can_delete(&writer, Resource::Articles, &own, &PolicyConfig::default()).is_ok());

        let editor = user(&[Capability::ChangeArticle], false);
        let own = Target(Some(editor.id));
        assert!(can_delete(&editor, Resource::Articles, &own, &PolicyConfig::default()).is_err());
    }

    #[test]
    fn test_unrestricted_delete_allows_any_caller() {
        let stranger = user(&[], false);
        let other = Target(Some(Uuid::new_v4()));
        let policy = PolicyConfig {
            unrestricted_delete: true,
        };

        assert!(can_delete(&stranger, Resource::Articles, &other, &policy).is_ok());
        // Edits stay restricted
        assert!(can_mutate(&stranger, Operation::Update, Resource::Articles, &other).is_err());
    }
}
