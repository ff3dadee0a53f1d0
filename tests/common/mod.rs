//! Shared three-contact directory used by the end-to-end tests.
//!
//! | contact | first | last   | email                  | department | status   | notes |
//! |---------|-------|--------|------------------------|------------|----------|-------|
//! | john    | John  | Doe    | john.doe@company.com   | it         | active   | yes   |
//! | jane    | Jane  | Smith  | jane.smith@company.com | hr         | active   |       |
//! | bob     | Bob   | Wilson | bob.wilson@company.com | it         | inactive |       |

#![allow(dead_code)]

use contacts_eav::{
    Contact, Directory, MemoryBackend, NewOption, NewProperty, PropertyOption, PropertyType,
    StorageBackend, UserId,
};

pub struct Fixture {
    pub dir: Directory<MemoryBackend>,
    pub user: UserId,
    pub john: Contact,
    pub jane: Contact,
    pub bob: Contact,
    pub it: PropertyOption,
    pub hr: PropertyOption,
    pub active: PropertyOption,
    pub inactive: PropertyOption,
}

pub async fn fixture() -> Fixture {
    let dir = Directory::open_memory();
    let user = Some(UserId::new());

    for (name, slug, ty) in [
        ("First Name", "first_name", PropertyType::Singleline),
        ("Last Name", "last_name", PropertyType::Singleline),
        ("Email", "email", PropertyType::Singleline),
        ("Department", "department", PropertyType::Option),
        ("Status", "status", PropertyType::Option),
        ("Notes", "notes", PropertyType::Textarea),
    ] {
        dir.create_property(NewProperty::new(name, ty).with_slug(slug), user)
            .await
            .unwrap();
    }

    let department = dir.backend().get_property_by_slug("department").await.unwrap();
    let status = dir.backend().get_property_by_slug("status").await.unwrap();
    let it = dir
        .add_option(department.id, NewOption::new("IT Department").with_code("it"))
        .await
        .unwrap();
    let hr = dir
        .add_option(department.id, NewOption::new("HR Department").with_code("hr"))
        .await
        .unwrap();
    let active = dir
        .add_option(status.id, NewOption::new("Active").with_code("active"))
        .await
        .unwrap();
    let inactive = dir
        .add_option(status.id, NewOption::new("Inactive").with_code("inactive"))
        .await
        .unwrap();

    let rows: [&[(&str, &str)]; 3] = [
        &[
            ("first_name", "John"),
            ("last_name", "Doe"),
            ("email", "john.doe@company.com"),
            ("department", "it"),
            ("status", "active"),
            ("notes", "Senior developer with 5 years experience"),
        ],
        &[
            ("first_name", "Jane"),
            ("last_name", "Smith"),
            ("email", "jane.smith@company.com"),
            ("department", "hr"),
            ("status", "active"),
        ],
        &[
            ("first_name", "Bob"),
            ("last_name", "Wilson"),
            ("email", "bob.wilson@company.com"),
            ("department", "it"),
            ("status", "inactive"),
        ],
    ];

    let mut contacts = Vec::new();
    for row in rows {
        let contact = dir.create_contact(user).await.unwrap();
        for (slug, raw) in row {
            dir.set_value_by_slug(contact.id, slug, raw, user).await.unwrap();
        }
        contacts.push(contact);
    }
    let [john, jane, bob]: [Contact; 3] = contacts.try_into().unwrap();

    Fixture {
        dir,
        user: user.unwrap(),
        john,
        jane,
        bob,
        it,
        hr,
        active,
        inactive,
    }
}
