use crate::db::models::{NewRoom, Room};
use crate::error::SchoolError;
use crate::models::school::{RoomType, validate_room_fields};
use crate::schema;
use crate::services::schedule::purge_rows;
use diesel::PgConnection;
use diesel::prelude::*;
use log::info;
use serde::Deserialize;

/// Room fields as submitted by the admin form.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomForm {
    pub number: String,
    pub capacity: i32,
    pub building: String,
    pub room_type: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl RoomForm {
    fn into_row(self) -> Result<NewRoom, SchoolError> {
        let number = self.number.trim().to_string();
        let building = self.building.trim().to_string();
        validate_room_fields(&number, self.capacity, &building)?;
        let room_type: RoomType = self.room_type.parse()?;
        Ok(NewRoom {
            number,
            capacity: self.capacity,
            building,
            room_type: room_type.as_str().to_string(),
            is_active: self.is_active,
        })
    }
}

fn ensure_number_free(conn: &mut PgConnection, number: &str, except: Option<i64>) -> Result<(), SchoolError> {
    use schema::room::dsl as RM;

    let mut query = RM::room.filter(RM::number.eq(number)).select(RM::id).into_boxed();
    if let Some(id) = except {
        query = query.filter(RM::id.ne(id));
    }
    if query.first::<i64>(conn).optional()?.is_some() {
        return Err(SchoolError::DuplicateKey(format!("room {} already exists", number)));
    }
    Ok(())
}

pub fn list(conn: &mut PgConnection) -> Result<Vec<Room>, SchoolError> {
    use schema::room::dsl as RM;

    Ok(RM::room
        .order((RM::building.asc(), RM::number.asc()))
        .select(Room::as_select())
        .load(conn)?)
}

pub fn create(conn: &mut PgConnection, form: RoomForm) -> Result<Room, SchoolError> {
    use schema::room::dsl as RM;

    let row = form.into_row()?;
    ensure_number_free(conn, &row.number, None)?;
    let room = diesel::insert_into(RM::room)
        .values(&row)
        .returning(Room::as_returning())
        .get_result::<Room>(conn)?;
    info!("Rooms: created {} ({})", room.number, room.building);
    Ok(room)
}

pub fn update(conn: &mut PgConnection, id: i64, form: RoomForm) -> Result<Room, SchoolError> {
    use schema::room::dsl as RM;

    let row = form.into_row()?;
    if RM::room.find(id).select(RM::id).first::<i64>(conn).optional()?.is_none() {
        return Err(SchoolError::NotFound(format!("room {} not found", id)));
    }
    ensure_number_free(conn, &row.number, Some(id))?;
    let room = diesel::update(RM::room.find(id))
        .set(&row)
        .returning(Room::as_returning())
        .get_result::<Room>(conn)?;
    info!("Rooms: updated {} ({})", room.number, room.building);
    Ok(room)
}

/// Delete a room. Active schedule rows block the deletion; inactive ones are
/// purged along with their substitutions.
pub fn delete(conn: &mut PgConnection, id: i64) -> Result<(), SchoolError> {
    use schema::room::dsl as RM;
    use schema::schedule::dsl as S;

    let room: Room = RM::room
        .find(id)
        .select(Room::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| SchoolError::NotFound(format!("room {} not found", id)))?;

    let active: i64 = S::schedule
        .filter(S::room_id.eq(id).and(S::is_active.eq(true)))
        .count()
        .get_result(conn)?;
    if active > 0 {
        return Err(SchoolError::Conflict(format!(
            "room {} is used by {} active schedule row(s)",
            room.number, active
        )));
    }

    let stale: Vec<i64> = S::schedule.filter(S::room_id.eq(id)).select(S::id).load(conn)?;
    purge_rows(conn, &stale)?;
    diesel::delete(RM::room.find(id)).execute(conn)?;
    info!("Rooms: deleted {} (purged {} inactive schedule row(s))", room.number, stale.len());
    Ok(())
}
