mod common;

use common::{PASSWORD, harness, within};
use taskdeck::{
    AuthError, AuthProvider, DocumentStore, Error, NoticeLevel, Registration, Role, ValidationError,
};

#[tokio::test]
async fn test_mismatched_passwords_never_write() {
    let h = harness().await;
    let mut notices = h.dashboard.notices();

    let result = h
        .dashboard
        .register(Registration {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password: "secret1".into(),
            confirm_password: "secret2".into(),
            role: None,
        })
        .await;

    assert!(matches!(
        result,
        Err(Error::Validation(ValidationError::PasswordMismatch))
    ));
    assert_eq!(h.store.write_count(), 0);
    assert_eq!(h.auth.account_count(), 0);
    assert!(h.auth.current().is_none());
    let notice = notices.recv().await.unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.message, "Passwords do not match");
}

#[tokio::test]
async fn test_short_password_and_blank_fields_are_rejected() {
    let h = harness().await;
    let short = h
        .dashboard
        .register(Registration::new("Ada", "ada@example.com", "12345"))
        .await;
    assert!(matches!(
        short,
        Err(Error::Validation(ValidationError::PasswordTooShort { min: 6 }))
    ));

    let nameless = h
        .dashboard
        .register(Registration::new(" ", "ada@example.com", PASSWORD))
        .await;
    assert!(matches!(
        nameless,
        Err(Error::Validation(ValidationError::EmptyField("Name")))
    ));
    assert_eq!(h.store.write_count(), 0);
}

#[tokio::test]
async fn test_registration_always_assigns_user_role() {
    let h = harness().await;
    let mut form = Registration::new("Mallory", "mallory@example.com", PASSWORD);
    form.role = Some(Role::Admin);

    let user = h.dashboard.register(form).await.expect("Failed to register");
    assert_eq!(user.role, Role::User);

    let stored = h
        .store
        .get("users", &user.id)
        .await
        .unwrap()
        .expect("Profile was not written");
    assert_eq!(stored.fields["role"], "user");
    assert_eq!(stored.fields["email"], "mallory@example.com");
    assert_eq!(stored.fields["name"], "Mallory");
    assert!(stored.fields.contains_key("createdAt"));

    let session = within(h.session.wait_until(|s| s.profile.is_some()))
        .await
        .unwrap();
    assert_eq!(session.role(), Some(Role::User));
    assert!(!session.is_manager());
}

#[tokio::test]
async fn test_duplicate_email_surfaces_provider_error() {
    let h = harness().await;
    h.register("Ada", "ada@example.com").await;
    let mut notices = h.dashboard.notices();
    let writes = h.store.write_count();

    let result = h
        .dashboard
        .register(Registration::new("Ada again", "ADA@example.com", PASSWORD))
        .await;
    assert!(matches!(
        result,
        Err(Error::Auth(AuthError::EmailAlreadyInUse))
    ));
    assert_eq!(h.store.write_count(), writes);
    let notice = notices.recv().await.unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.message, AuthError::EmailAlreadyInUse.to_string());
}

#[tokio::test]
async fn test_sign_in_and_out_drive_the_session() {
    let h = harness().await;
    let registered = h.register("Ada", "ada@example.com").await;

    h.dashboard.sign_out().await.expect("Failed to sign out");
    let signed_out = within(h.session.wait_until(|s| s.identity.is_none()))
        .await
        .unwrap();
    assert!(signed_out.profile.is_none());
    assert!(matches!(
        h.dashboard.todos(&signed_out),
        Err(Error::NotSignedIn)
    ));

    let wrong = h.dashboard.sign_in("ada@example.com", "not-it").await;
    assert!(matches!(
        wrong,
        Err(Error::Auth(AuthError::InvalidCredential))
    ));

    let again = h.sign_in("ada@example.com", Role::User).await;
    assert_eq!(again.user_id(), registered.user_id());
}

#[tokio::test]
async fn test_only_admins_change_roles() {
    let h = harness().await;
    let bob = h.register("Bob", "bob@example.com").await;
    let bob_id = bob.user_id().unwrap().to_string();

    let refused = h.dashboard.set_role(&bob, &bob_id, Role::Admin).await;
    assert!(matches!(
        refused,
        Err(Error::Forbidden {
            required: Role::Admin,
            ..
        })
    ));

    let admin = h.register_as("Root", "root@example.com", Role::Admin).await;
    h.dashboard
        .set_role(&admin, &bob_id, Role::Manager)
        .await
        .expect("Failed to change role");

    let promoted = h.sign_in("bob@example.com", Role::Manager).await;
    assert!(promoted.is_manager());
    assert!(!promoted.is_admin());
}
