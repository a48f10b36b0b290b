//! Public leaderboard: a ranked snapshot and a live SSE stream.

use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::Stream;
use tracing::{debug, warn};

use super::{ApiError, AppState};
use crate::feed::{LeaderboardView, RankedTeam, Standings, ViewUpdate};

/// `GET /api/leaderboard`
pub async fn leaderboard(State(state): State<AppState>) -> Result<Json<Vec<RankedTeam>>, ApiError> {
    let standings = Standings::new(state.db.list_public_teams().await?);
    Ok(Json(standings.ranked()))
}

fn standings_event(standings: &Standings) -> Result<Event, axum::Error> {
    Event::default().event("standings").json_data(standings.ranked())
}

/// `GET /api/leaderboard/stream`
///
/// Sends the ranked standings on connect and again after every change.
/// The view (and its feed subscription) lives inside the stream, so a
/// client disconnect releases it.
pub async fn stream(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let mut view = LeaderboardView::mount(&state.db).await?;

    let events = async_stream::stream! {
        yield standings_event(view.standings());
        loop {
            match view.next_update().await {
                Ok(ViewUpdate::Changed | ViewUpdate::Resynced) => {
                    yield standings_event(view.standings());
                }
                Ok(ViewUpdate::Closed) => break,
                Err(e) => {
                    warn!(error = %e, "Leaderboard stream resync failed");
                    break;
                }
            }
        }
        debug!("Leaderboard stream finished");
        view.unmount();
    };

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
