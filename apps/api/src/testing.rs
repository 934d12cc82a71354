//! Fixtures shared by the async tests.

use uuid::Uuid;

use crate::itinerarios::converter::{convert, ConvertRequest};
use crate::models::activity::NewActivity;
use crate::roteiros::catalog::{create_roteiro, CreateRoteiroRequest, RoteiroActivityInput};
use crate::session::Session;
use crate::store::TableStore;

/// Creates a roteiro with one new activity per name and converts it into an itinerario
/// running 2024-07-01..=2024-07-03. Returns the itinerario id.
pub async fn seed_itinerario(store: &dyn TableStore, session: &Session, names: &[&str]) -> Uuid {
    let roteiro = create_roteiro(
        store,
        session,
        CreateRoteiroRequest {
            titulo: "Viagem de teste".to_string(),
            descricao: None,
            activities: names
                .iter()
                .map(|name| {
                    RoteiroActivityInput::New(NewActivity {
                        nome: name.to_string(),
                        local: "Rio de Janeiro".to_string(),
                        descricao: None,
                        foto_url: None,
                    })
                })
                .collect(),
        },
    )
    .await
    .expect("seed roteiro");

    convert(
        store,
        session,
        roteiro.roteiro.id,
        ConvertRequest {
            start_date: Some("2024-07-01".parse().expect("date")),
            end_date: Some("2024-07-03".parse().expect("date")),
            place: Some("Rio de Janeiro".to_string()),
            moves: vec![],
            times: vec![],
        },
        "09:00",
    )
    .await
    .expect("seed itinerario")
    .itinerario_id
}
