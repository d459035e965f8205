use actix_web::web::{scope, ServiceConfig};
use actix_web::Scope;

use collaborators::{add_collaborator, list_collaborators, update_collaborator};
use documents::{delete_document, download_document, list_request_documents, upload_document};
use portals::{create_portal, delete_portal, get_portal, get_portals, update_portal};
use requests::{
    create_request, delete_request, get_request, get_request_statistics, list_requests,
    update_request, update_request_status,
};
use roles::{assign_role, get_roles};
use users::{deactivate_account, get_profile, login};

mod collaborators;
mod documents;
mod health_check;
mod portals;
mod requests;
mod roles;
mod users;

use crate::routes::health_check::*;

fn util_routes() -> Scope {
    scope("").service(health_check)
}

fn users_routes() -> Scope {
    scope("users")
        .service(login)
        .service(get_profile)
        .service(deactivate_account)
}

fn roles_routes() -> Scope {
    scope("roles").service(get_roles).service(assign_role)
}

fn portals_routes() -> Scope {
    scope("portals")
        .service(create_portal)
        .service(get_portals)
        .service(get_portal)
        .service(update_portal)
        .service(delete_portal)
        // collaborator routes
        .service(add_collaborator)
        .service(list_collaborators)
        .service(update_collaborator)
        // a request is always filed against a portal
        .service(create_request)
}

fn requests_routes() -> Scope {
    scope("requests")
        // statistics before the dynamic uuid match
        .service(get_request_statistics)
        .service(list_requests)
        .service(get_request)
        .service(update_request)
        .service(update_request_status)
        .service(delete_request)
        // document routes
        .service(upload_document)
        .service(list_request_documents)
        .service(delete_document)
}

fn documents_routes() -> Scope {
    scope("documents").service(download_document)
}

pub fn portal_desk_routes(conf: &mut ServiceConfig) {
    conf.service(
        scope("api/v1")
            .service(users_routes())
            .service(roles_routes())
            .service(portals_routes())
            .service(requests_routes())
            .service(documents_routes())
            .service(util_routes()),
    );
}
