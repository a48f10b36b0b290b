use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{ApiError, AppState, TeamSession, validation};
use crate::storage::{NewMember, Team, TeamMember};

/// Members a team may add on top of its leader.
const MAX_EXTRA_MEMBERS: usize = 3;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnTeam {
    pub id: String,
    pub team_id: String,
    pub name: String,
    pub leader_name: String,
    pub leader_email: String,
    pub institution: String,
    pub team_size: i64,
    pub score: i64,
    pub members: Vec<MemberView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl From<TeamMember> for MemberView {
    fn from(m: TeamMember) -> Self {
        Self {
            id: m.id,
            name: m.name,
            email: m.email,
        }
    }
}

fn own_team_view(team: Team, members: Vec<TeamMember>) -> OwnTeam {
    OwnTeam {
        id: team.id,
        team_id: team.team_id,
        name: team.name,
        leader_name: team.leader_name,
        leader_email: team.leader_email,
        institution: team.institution,
        team_size: team.team_size,
        score: team.score,
        members: members.into_iter().map(MemberView::from).collect(),
    }
}

/// `GET /api/team`
pub async fn own_team(
    State(state): State<AppState>,
    session: TeamSession,
) -> Result<Json<OwnTeam>, ApiError> {
    let members = state.db.list_team_members(&session.team.id).await?;
    Ok(Json(own_team_view(session.team, members)))
}

#[derive(Debug, Deserialize)]
pub struct MemberForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddMembersRequest {
    pub members: Vec<MemberForm>,
}

/// `POST /api/team/members`
#[instrument(skip_all, fields(team = %session.team.id))]
pub async fn add_members(
    State(state): State<AppState>,
    session: TeamSession,
    payload: Result<Json<AddMembersRequest>, JsonRejection>,
) -> Result<Json<OwnTeam>, ApiError> {
    let Json(request) = payload?;
    if request.members.len() > MAX_EXTRA_MEMBERS {
        return Err(ApiError::BadRequest(format!(
            "At most {MAX_EXTRA_MEMBERS} additional members"
        )));
    }

    let mut members = Vec::with_capacity(request.members.len());
    for form in &request.members {
        let Some(name) = validation::member_name(&form.name)? else {
            continue;
        };
        let email = validation::member_email(form.email.as_deref())?;
        members.push(NewMember { name, email });
    }

    let team = if members.is_empty() {
        session.team
    } else {
        let team = state.db.add_team_members(&session.team.id, &members).await?;
        info!(added = members.len(), team_size = team.team_size, "Team members added");
        team
    };

    let all = state.db.list_team_members(&team.id).await?;
    Ok(Json(own_team_view(team, all)))
}
