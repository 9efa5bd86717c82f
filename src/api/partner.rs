//! `POST /partner`: outlet registration and menu submissions share one route.

use axum::{extract::State, Json};
use bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use tap::TapFallible;
use validator::Validate;

use crate::{
    error::Error,
    store::{fields, SharedStore, Store},
    util::{bson_to_json, ValidJson},
};

use super::{
    auth::UserAccess,
    role::{assign_role, RoleAssignment, RoleRequest},
    user::UserRole,
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PartnerRequestKind {
    Register,
    MenuAppend,
}

const KIND: &str = "kind";

/// `kind` only acts as the request tag when it holds one of the
/// [`PartnerRequestKind`] values; any other `kind` is an ordinary menu field.
#[derive(Validate, Serialize, Deserialize, Debug, Clone)]
pub struct PartnerRequest {
    #[validate(email)]
    pub email: String,

    #[serde(flatten)]
    pub fields: Document,
}

impl PartnerRequest {
    fn tag(&self) -> Option<PartnerRequestKind> {
        self.fields
            .get(KIND)
            .and_then(|kind| bson::from_bson(kind.clone()).ok())
    }

    /// Without a tag, a truthy `outletName` means registration.
    pub fn kind(&self) -> PartnerRequestKind {
        if let Some(kind) = self.tag() {
            return kind;
        }

        match self.fields.get("outletName") {
            Some(name) if is_truthy(name) => PartnerRequestKind::Register,
            _ => PartnerRequestKind::MenuAppend,
        }
    }

    /// Drops the request tag so it is never stored.
    pub fn without_tag(mut self) -> Self {
        if self.tag().is_some() {
            self.fields.remove(KIND);
        }
        self
    }

    fn into_menu_item(self) -> Document {
        let mut item = bson::doc! { "email": self.email };
        item.extend(self.fields);
        item
    }
}

/// JavaScript truthiness of a BSON value.
pub fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Null | Bson::Undefined => false,
        Bson::Boolean(value) => *value,
        Bson::String(value) => !value.is_empty(),
        Bson::Int32(value) => *value != 0,
        Bson::Int64(value) => *value != 0,
        Bson::Double(value) => *value != 0.0 && !value.is_nan(),
        _ => true,
    }
}

/// The `menu` of a partner as JSON, `[]` when it has none.
pub fn menu_of(partner: &Document) -> serde_json::Value {
    match partner.get(fields::MENU) {
        Some(menu @ Bson::Array(_)) => bson_to_json(menu),
        _ => serde_json::Value::Array(vec![]),
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MenuResponse {
    pub email: String,
    pub menu: serde_json::Value,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PartnerResponse {
    Register(RoleAssignment),
    MenuAppend(MenuResponse),
}

#[tracing::instrument(skip(store, item))]
pub async fn append_menu_item(
    store: &dyn Store,
    email: &str,
    item: Document,
) -> Result<MenuResponse, Error> {
    let partner = store
        .append_menu_item(email, item)
        .await?
        .ok_or(Error::PartnerNotFound)
        .tap_err(|_| tracing::debug!("menu submitted for an unregistered outlet"))?;

    Ok(MenuResponse {
        email: email.to_string(),
        menu: menu_of(&partner),
    })
}

pub async fn submit(
    State(store): State<SharedStore>,
    _user: UserAccess,
    ValidJson(request): ValidJson<PartnerRequest>,
) -> Result<Json<PartnerResponse>, Error> {
    let kind = request.kind();
    let request = request.without_tag();

    let response = match kind {
        PartnerRequestKind::Register => {
            let request = RoleRequest {
                email: request.email,
                profile: request.fields,
            };

            PartnerResponse::Register(assign_role(store.as_ref(), UserRole::Partner, request).await?)
        }
        PartnerRequestKind::MenuAppend => {
            let email = request.email.clone();

            PartnerResponse::MenuAppend(
                append_menu_item(store.as_ref(), &email, request.into_menu_item()).await?,
            )
        }
    };

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use crate::api::tests::bootstrap;

    use super::*;

    fn parse(body: serde_json::Value) -> PartnerRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_kind_from_outlet_name() {
        let kind = |body| parse(body).kind();

        assert_eq!(
            kind(json!({ "email": "p@b.com", "outletName": "X" })),
            PartnerRequestKind::Register
        );
        assert_eq!(
            kind(json!({ "email": "p@b.com", "outletName": "" })),
            PartnerRequestKind::MenuAppend
        );
        assert_eq!(
            kind(json!({ "email": "p@b.com", "dish": "biryani" })),
            PartnerRequestKind::MenuAppend
        );
        assert_eq!(
            kind(json!({ "email": "p@b.com", "outletName": null })),
            PartnerRequestKind::MenuAppend
        );
    }

    #[test]
    fn test_explicit_kind_wins() {
        let request = parse(json!({
            "kind": "menu-append",
            "email": "p@b.com",
            "outletName": "X",
        }));
        assert_eq!(request.kind(), PartnerRequestKind::MenuAppend);
        assert!(request.without_tag().fields.get("kind").is_none());

        let request = parse(json!({ "kind": "register", "email": "p@b.com" }));
        assert_eq!(request.kind(), PartnerRequestKind::Register);
    }

    #[test]
    fn test_other_kind_is_a_menu_field() {
        let request = parse(json!({ "email": "p@b.com", "dish": "lassi", "kind": "drink" }));

        assert_eq!(request.kind(), PartnerRequestKind::MenuAppend);
        assert_eq!(
            request.without_tag().fields.get_str("kind").ok(),
            Some("drink")
        );

        let request = parse(json!({ "email": "p@b.com", "outletName": "X", "kind": 3 }));
        assert_eq!(request.kind(), PartnerRequestKind::Register);
    }

    #[tokio::test]
    async fn test_menu_item_keeps_its_own_kind() {
        let bootstrap = bootstrap();
        bootstrap
            .memory
            .seed(
                crate::store::collections::PARTNER,
                [bson::doc! { "email": "p@b.com" }],
            )
            .await;

        let Json(response) = submit(
            bootstrap.store(),
            bootstrap.user_access(),
            ValidJson(parse(json!({ "email": "p@b.com", "dish": "lassi", "kind": "drink" }))),
        )
        .await
        .unwrap();

        let PartnerResponse::MenuAppend(menu) = response else {
            panic!("expected a menu append");
        };
        assert_eq!(menu.menu[0]["kind"], "drink");
        assert_eq!(menu.menu[0]["dish"], "lassi");
    }

    #[tokio::test]
    async fn test_tag_is_not_stored() {
        let bootstrap = bootstrap();
        let email = bootstrap.register("tagged@tasty.com").await;

        let Json(response) = submit(
            bootstrap.store(),
            bootstrap.user_access(),
            ValidJson(parse(json!({ "kind": "register", "email": email }))),
        )
        .await
        .unwrap();
        assert_matches!(response, PartnerResponse::Register(..));

        let partner = bootstrap
            .memory
            .partner_by_email(&email)
            .await
            .unwrap()
            .unwrap();
        assert!(partner.get("kind").is_none());
    }

    #[test]
    fn test_is_truthy() {
        assert!(!is_truthy(&Bson::Null));
        assert!(!is_truthy(&Bson::Boolean(false)));
        assert!(!is_truthy(&Bson::Int32(0)));
        assert!(!is_truthy(&Bson::Double(f64::NAN)));
        assert!(!is_truthy(&Bson::String(String::new())));
        assert!(is_truthy(&Bson::String("0".to_string())));
        assert!(is_truthy(&Bson::Document(Document::new())));
        assert!(is_truthy(&Bson::Array(vec![])));
    }

    #[tokio::test]
    async fn test_register_then_append_in_order() {
        let bootstrap = bootstrap();
        let email = bootstrap.register("outlet@tasty.com").await;

        let Json(registered) = submit(
            bootstrap.store(),
            bootstrap.user_access(),
            ValidJson(parse(json!({
                "email": email,
                "outletName": "Kacchi Bhai",
                "locationOfOutlet": "Dhanmondi",
            }))),
        )
        .await
        .unwrap();
        assert_matches!(registered, PartnerResponse::Register(assignment) if assignment.role == UserRole::Partner);

        for (appended, dish) in ["A", "B"].into_iter().enumerate() {
            let Json(response) = submit(
                bootstrap.store(),
                bootstrap.user_access(),
                ValidJson(parse(json!({ "email": email, "dish": dish }))),
            )
            .await
            .unwrap();

            assert_matches!(
                response,
                PartnerResponse::MenuAppend(MenuResponse { menu, .. })
                    if menu.as_array().map(Vec::len) == Some(appended + 1)
            );
        }

        let partner = bootstrap
            .memory
            .partner_by_email(&email)
            .await
            .unwrap()
            .unwrap();
        let dishes: Vec<_> = partner
            .get_array("menu")
            .unwrap()
            .iter()
            .filter_map(|item| item.as_document()?.get_str("dish").ok())
            .collect();
        assert_eq!(dishes, vec!["A", "B"]);
        assert_eq!(partner.get_str("outletName").ok(), Some("Kacchi Bhai"));
    }

    #[tokio::test]
    async fn test_append_response_carries_menu() {
        let bootstrap = bootstrap();
        bootstrap
            .memory
            .seed(
                crate::store::collections::PARTNER,
                [bson::doc! { "email": "p@b.com", "menu": [{ "dish": "existing" }] }],
            )
            .await;

        let response = append_menu_item(&bootstrap.memory, "p@b.com", bson::doc! { "dish": "new" })
            .await
            .unwrap();

        assert_eq!(
            response.menu,
            json!([{ "dish": "existing" }, { "dish": "new" }])
        );
    }

    #[tokio::test]
    async fn test_reregistering_keeps_menu() {
        let bootstrap = bootstrap();
        let email = bootstrap.register("keep@tasty.com").await;

        for body in [
            json!({ "email": email, "outletName": "First" }),
            json!({ "email": email, "dish": "A" }),
            json!({ "email": email, "outletName": "Renamed" }),
        ] {
            let Json(_) = submit(bootstrap.store(), bootstrap.user_access(), ValidJson(parse(body)))
                .await
                .unwrap();
        }

        let partner = bootstrap
            .memory
            .partner_by_email(&email)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(partner.get_str("outletName").ok(), Some("Renamed"));
        assert_eq!(partner.get_array("menu").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_append_without_outlet_is_not_found() {
        let bootstrap = bootstrap();

        let err = submit(
            bootstrap.store(),
            bootstrap.user_access(),
            ValidJson(parse(json!({ "email": "nobody@tasty.com", "dish": "A" }))),
        )
        .await
        .unwrap_err();

        assert_matches!(err, Error::PartnerNotFound);
    }
}
